// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectifier — warps a detected quad into an upright rectangle.

use image::{DynamicImage, ImageBuffer, Pixel};
use imageproc::geometric_transformations::Projection;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{Quad, Size};
use tracing::{debug, instrument};

/// Largest canvas `rectify_image` will allocate. Legal paper at 1200 dpi fits.
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Canvas matching the quad's own proportions: the longer of each pair of
/// opposite edges, rounded, at least one pixel.
pub fn native_size(quad: &Quad) -> Size {
    let ordered = quad.ordered();
    let side = |v: f32| if v.is_finite() { (v.round() as u32).max(1) } else { 1 };
    Size::new(side(ordered.measured_width()), side(ordered.measured_height()))
}

/// Warp the region inside `quad` onto an upright canvas of `target` size
/// (or [`native_size`] when `None`).
///
/// Every destination pixel is mapped back into the source through the
/// projective transform solved from the four corner pairs and sampled
/// bilinearly. Samples outside the source are clamped to its edge. The
/// channel layout of the input is preserved.
#[instrument(skip(image), fields(src_w = image.width(), src_h = image.height()))]
pub fn rectify_image(image: &DynamicImage, quad: &Quad, target: Option<Size>) -> Result<DynamicImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PagewerkError::DegenerateQuad("source image is empty".into()));
    }

    let ordered = quad.ordered();
    if !(ordered.area() >= 1.0) {
        return Err(PagewerkError::DegenerateQuad(format!(
            "quad encloses {} px²",
            ordered.area()
        )));
    }

    let size = target.unwrap_or_else(|| native_size(&ordered));
    if size.width == 0 || size.height == 0 {
        return Err(PagewerkError::DegenerateQuad(format!(
            "target canvas {}x{} is empty",
            size.width, size.height
        )));
    }

    if u64::from(size.width) * u64::from(size.height) > MAX_CANVAS_PIXELS {
        return Err(PagewerkError::DegenerateQuad(format!(
            "target canvas {}x{} exceeds {MAX_CANVAS_PIXELS} pixels",
            size.width, size.height
        )));
    }

    let ((x0, x1), (y0, y1)) = (pixel_span(size.width), pixel_span(size.height));
    let destination = [(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
    let source = ordered.points.map(|p| (p.x, p.y));
    let projection = Projection::from_control_points(destination, source).ok_or_else(|| {
        PagewerkError::DegenerateQuad("perspective transform is singular".into())
    })?;

    let warped = match image {
        DynamicImage::ImageLuma8(buf) => DynamicImage::ImageLuma8(warp(buf, &projection, size)),
        DynamicImage::ImageRgb8(buf) => DynamicImage::ImageRgb8(warp(buf, &projection, size)),
        DynamicImage::ImageRgba8(buf) => DynamicImage::ImageRgba8(warp(buf, &projection, size)),
        other => DynamicImage::ImageRgba8(warp(&other.to_rgba8(), &projection, size)),
    };
    debug!(out_w = size.width, out_h = size.height, "Quad rectified");
    Ok(warped)
}

/// Destination coordinates the quad's edges map to along one axis: the
/// outermost pixel centres, or half a pixel either side of a lone pixel so
/// it samples the quad's midline.
fn pixel_span(len: u32) -> (f32, f32) {
    if len > 1 { (0.0, (len - 1) as f32) } else { (-0.5, 0.5) }
}

fn warp<P>(src: &ImageBuffer<P, Vec<u8>>, projection: &Projection, size: Size) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let max_x = (src.width() - 1) as f32;
    let max_y = (src.height() - 1) as f32;
    ImageBuffer::from_fn(size.width, size.height, |x, y| {
        let (sx, sy) = *projection * (x as f32, y as f32);
        sample_bilinear(src, sx.clamp(0.0, max_x), sy.clamp(0.0, max_y))
    })
}

/// Bilinear sample at an in-bounds, non-integer position.
fn sample_bilinear<P>(src: &ImageBuffer<P, Vec<u8>>, x: f32, y: f32) -> P
where
    P: Pixel<Subpixel = u8>,
{
    // NaN (a point sent to infinity) casts to 0.
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(src.width() - 1);
    let y1 = (y0 + 1).min(src.height() - 1);
    let fx = if x.is_finite() { x - x0 as f32 } else { 0.0 };
    let fy = if y.is_finite() { y - y0 as f32 } else { 0.0 };

    let p00 = src.get_pixel(x0, y0).channels();
    let p10 = src.get_pixel(x1, y0).channels();
    let p01 = src.get_pixel(x0, y1).channels();
    let p11 = src.get_pixel(x1, y1).channels();

    let mut out = *src.get_pixel(x0, y0);
    for (c, value) in out.channels_mut().iter_mut().enumerate() {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        *value = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}
