// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Imaging backend capability trait.

use pagewerk_core::error::Result;
use pagewerk_core::{ImageHandle, OutputFormat, PaperGuess, Preset, Quad, Size};

use crate::scan::ocr::{OcrFrame, PixelLayout};
use crate::store::{ImageStore, ScopedHandle};

/// Everything the scan orchestrator needs from an imaging implementation.
///
/// Stages that produce pixels return a fresh handle in [`store`](Self::store);
/// the caller owns it and must release it (usually through
/// [`scoped`](Self::scoped)). Inputs are never modified.
pub trait ImagingBackend {
    /// The buffer registry every handle of this backend lives in.
    fn store(&self) -> &ImageStore;

    /// Locate the document. `Ok(None)` when nothing was found.
    fn detect(&self, handle: ImageHandle) -> Result<Option<Quad>>;

    fn guess_paper(&self, quad: &Quad) -> Option<PaperGuess>;

    /// Warp `quad` to an upright canvas of `target` size, or the quad's own
    /// size when `None`.
    fn rectify(&self, handle: ImageHandle, quad: &Quad, target: Option<Size>) -> Result<ImageHandle>;

    fn enhance(&self, handle: ImageHandle, preset: Preset) -> Result<ImageHandle>;

    /// Copy of the image with `quad` drawn on it.
    fn render_overlay(&self, handle: ImageHandle, quad: &Quad) -> Result<ImageHandle>;

    // -- Provided -------------------------------------------------------------

    fn decode(&self, bytes: &[u8]) -> Result<ImageHandle> {
        self.store().decode(bytes)
    }

    fn encode(&self, handle: ImageHandle, format: OutputFormat) -> Result<Vec<u8>> {
        self.store().encode(handle, format)
    }

    fn release(&self, handle: ImageHandle) {
        self.store().release(handle)
    }

    fn scoped(&self, handle: ImageHandle) -> ScopedHandle<'_> {
        self.store().scoped(handle)
    }

    fn dimensions(&self, handle: ImageHandle) -> Result<Size> {
        self.store().dimensions(handle)
    }

    /// Raw pixels of `handle` for an external text recognizer.
    fn ocr_frame(
        &self,
        handle: ImageHandle,
        layout: PixelLayout,
        row_alignment: usize,
    ) -> Result<OcrFrame> {
        let image = self.store().get(handle)?;
        Ok(OcrFrame::from_image(&image, layout, row_alignment))
    }
}
