// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-document — Imaging pipeline for the Pagewerk document scanner.
//
// Provides the image buffer store, JPEG/PNG codecs, document quad detection,
// paper-size matching, perspective rectification, enhancement presets, and the
// scan orchestrator that chains them.

pub mod backend;
pub mod image;
pub mod pipeline;
pub mod scan;
pub mod store;

// Re-export the primary entry points so callers can use `pagewerk_document::ScanPipeline` etc.
pub use backend::ImagingBackend;
pub use image::processor::ImageProcessor;
pub use pipeline::{ScanPipeline, process_with};
pub use scan::detect::{QuadDetector, detect_image};
pub use scan::enhance::{ScanEnhancer, enhance_image};
pub use scan::ocr::{OcrFrame, PixelLayout};
pub use scan::rectify::{native_size, rectify_image};
pub use store::{ImageStore, ScopedHandle};

#[cfg(test)]
pub(crate) mod testing;
