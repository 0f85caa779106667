// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the capture screen.
//
// Every pipeline error is mapped to plain English with a clear suggestion.
// The severity drives how the UI presents it (retake prompt vs. error page).

use crate::error::PagewerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The user should retake or reframe the photo.
    Retake,
    /// The user must do something else (pick another file, fix settings).
    ActionRequired,
    /// Cannot be fixed by the user; an internal fault.
    Internal,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether trying again with a new photo can succeed.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `PagewerkError` into a `HumanError` suitable for the capture UI.
pub fn humanize_error(err: &PagewerkError) -> HumanError {
    match err {
        PagewerkError::NoDocumentDetected => HumanError {
            message: "We couldn't find the page in this photo.".into(),
            suggestion: "Place the page on a darker surface, make sure all four corners are visible, and take the photo again.".into(),
            retriable: true,
            severity: Severity::Retake,
        },

        PagewerkError::DegenerateQuad(_) => HumanError {
            message: "The page corners don't form a usable shape.".into(),
            suggestion: "Drag the corner handles so they sit on the four corners of the page.".into(),
            retriable: true,
            severity: Severity::Retake,
        },

        PagewerkError::Decode(_) => HumanError {
            message: "There's a problem with this image.".into(),
            suggestion: "The image may be damaged or in an unusual format. Try a JPEG or PNG photo instead.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PagewerkError::Encode(_) => HumanError {
            message: "We couldn't save the finished page.".into(),
            suggestion: "Try again. If this keeps happening, try a different output quality.".into(),
            retriable: true,
            severity: Severity::Internal,
        },

        PagewerkError::InvalidHandle(_) => HumanError {
            message: "The app had an internal image problem.".into(),
            suggestion: "Please scan the page again. If this keeps happening, please report it.".into(),
            retriable: false,
            severity: Severity::Internal,
        },

        PagewerkError::InvalidConfig(detail) => HumanError {
            message: "The scanner settings aren't valid.".into(),
            suggestion: format!("Reset the scanner settings to their defaults. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PagewerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the photo again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading a file.".into(),
                    suggestion: "Try again. If this keeps happening, your device's storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Internal,
                }
            }
        }

        PagewerkError::Serialization(_) => HumanError {
            message: "The scanner settings file is damaged.".into(),
            suggestion: "Reset the scanner settings to their defaults.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}
