// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagewerk.

use thiserror::Error;

use crate::types::ImageHandle;

/// Top-level error type for all Pagewerk operations.
#[derive(Debug, Error)]
pub enum PagewerkError {
    // -- Codec errors --
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    // -- Pipeline errors --
    #[error("no document detected in the photo")]
    NoDocumentDetected,

    #[error("degenerate quadrilateral: {0}")]
    DegenerateQuad(String),

    /// A stale, unknown, or already-released handle was used.
    ///
    /// Correct call sequences never produce this; it is not meant to be
    /// caught and retried.
    #[error("invalid image handle {0}")]
    InvalidHandle(ImageHandle),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PagewerkError {
    /// Whether the caller can reasonably retry with a different photo.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoDocumentDetected)
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagewerkError>;
