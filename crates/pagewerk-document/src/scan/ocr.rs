// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR handoff — exports a buffer as a raw, row-padded pixel frame for an
// external text recognizer.
//
// Recognition itself happens outside this crate. Engines typically want
// tightly packed 8-bit grayscale, or RGBA rows aligned to 4 or 16 bytes;
// `OcrFrame` carries exactly that plus the stride needed to walk it.

use image::DynamicImage;
use tracing::debug;

/// Pixel layout of an [`OcrFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// One luminance byte per pixel (preferred by most engines).
    Gray8,
    /// Red, green, blue, alpha bytes per pixel.
    Rgba8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgba8 => 4,
        }
    }
}

/// Raw pixels ready for a recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrFrame {
    /// `stride * height` bytes; padding bytes are zero.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes from the start of one row to the next.
    pub stride: usize,
    pub layout: PixelLayout,
}

impl OcrFrame {
    /// Convert `image` to `layout`, padding each row up to a multiple of
    /// `row_alignment` bytes. An alignment of 0 or 1 packs rows tightly.
    pub fn from_image(image: &DynamicImage, layout: PixelLayout, row_alignment: usize) -> Self {
        let (width, height) = (image.width(), image.height());
        let pixels = match layout {
            PixelLayout::Gray8 => image.to_luma8().into_raw(),
            PixelLayout::Rgba8 => image.to_rgba8().into_raw(),
        };

        let packed = width as usize * layout.bytes_per_pixel();
        let stride = packed.next_multiple_of(row_alignment.max(1));
        let data = if stride == packed {
            pixels
        } else {
            let mut data = vec![0u8; stride * height as usize];
            for (dst, src) in data.chunks_exact_mut(stride).zip(pixels.chunks_exact(packed)) {
                dst[..packed].copy_from_slice(src);
            }
            data
        };
        debug!(width, height, stride, layout = ?layout, "OCR frame prepared");

        Self {
            data,
            width,
            height,
            stride,
            layout,
        }
    }

    /// Pixels of row `y` without padding, or `None` past the last row.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride;
        let len = self.width as usize * self.layout.bytes_per_pixel();
        self.data.get(start..start + len)
    }
}
