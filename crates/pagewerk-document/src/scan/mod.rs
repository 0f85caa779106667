// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning stages — quad detection, paper matching, rectification,
// enhancement presets, debug overlay, and OCR frame export.

pub mod detect;
pub mod enhance;
pub mod filters;
pub mod ocr;
pub mod overlay;
pub mod paper;
pub mod rectify;

pub use detect::QuadDetector;
pub use enhance::ScanEnhancer;
pub use ocr::OcrFrame;
