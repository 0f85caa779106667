// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, layout normalisation, downscaling, and JPEG/PNG
// encoding. Operates on in-memory images using the `image` crate.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GrayImage, ImageFormat};
use pagewerk_core::error::PagewerkError;
use pagewerk_core::{OutputFormat, Size};
use tracing::{debug, instrument};

/// Codec wrapper around a single in-memory image.
///
/// Consuming methods return a new `ImageProcessor`, so calls chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&raw)?
///     .normalized()
///     .encode(OutputFormat::jpeg(85))?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PagewerkError> {
        if data.is_empty() {
            return Err(PagewerkError::Decode("empty input".into()));
        }
        let img = image::load_from_memory(data)
            .map_err(|err| PagewerkError::Decode(err.to_string()))?;
        debug!(
            width = img.width(),
            height = img.height(),
            color = ?img.color(),
            "Image decoded from bytes"
        );
        Ok(Self { image: img })
    }

    /// Read and decode an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, PagewerkError> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.image.width(), self.image.height())
    }

    /// Borrow the underlying `DynamicImage`.
    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    /// Consume the processor and return the underlying `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    // -- Transformations ------------------------------------------------------

    /// Convert to one of the three pipeline layouts: 8-bit gray, RGB, or RGBA.
    ///
    /// Gray+alpha becomes RGBA; 16-bit and float images are reduced to 8 bits.
    pub fn normalized(self) -> Self {
        let image = match self.image.color() {
            ColorType::L8 | ColorType::Rgb8 | ColorType::Rgba8 => self.image,
            ColorType::L16 => DynamicImage::ImageLuma8(self.image.to_luma8()),
            ColorType::Rgb16 | ColorType::Rgb32F => DynamicImage::ImageRgb8(self.image.to_rgb8()),
            _ => DynamicImage::ImageRgba8(self.image.to_rgba8()),
        };
        Self { image }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode in the requested output format.
    pub fn encode(&self, format: OutputFormat) -> Result<Vec<u8>, PagewerkError> {
        encode_image(&self.image, format)
    }

    /// Encode the current image as PNG bytes, keeping its channel layout.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PagewerkError> {
        encode_png(&self.image)
    }

    /// Encode as JPEG with the given quality (clamped to 1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, PagewerkError> {
        encode_jpeg(&self.image, quality)
    }
}

/// Encode a `DynamicImage` in the requested output format.
pub fn encode_image(image: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, PagewerkError> {
    match format {
        OutputFormat::Jpeg { quality } => encode_jpeg(image, quality),
        OutputFormat::Png => encode_png(image),
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, PagewerkError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| PagewerkError::Encode(format!("PNG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Grayscale images stay single-channel; alpha is dropped.
fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PagewerkError> {
    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    let result = match image {
        DynamicImage::ImageLuma8(gray) => gray.write_with_encoder(encoder),
        other => other.to_rgb8().write_with_encoder(encoder),
    };
    result.map_err(|err| PagewerkError::Encode(format!("JPEG encoding failed: {}", err)))?;
    Ok(buffer)
}

/// Shrink `gray` so its longer side is at most `max_dimension`.
///
/// Returns the working image and the factor that maps source coordinates to
/// working coordinates (1.0 when no shrinking was needed; never upscales).
pub fn fit_within(gray: &GrayImage, max_dimension: u32) -> (GrayImage, f32) {
    let (w, h) = gray.dimensions();
    let longest = w.max(h);
    if longest <= max_dimension || longest == 0 {
        return (gray.clone(), 1.0);
    }
    let scale = max_dimension as f32 / longest as f32;
    let new_w = ((w as f32 * scale).round() as u32).max(1);
    let new_h = ((h as f32 * scale).round() as u32).max(1);
    let resized = image::imageops::resize(gray, new_w, new_h, FilterType::Triangle);
    (resized, scale)
}
