// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pixel filters shared by the detector and the enhancement presets:
// thresholds, box means, CLAHE, background flattening, tone curves,
// and luminance/chrominance conversion.

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::definitions::Image;
use imageproc::distance_transform::Norm;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::integral_image::{integral_image, sum_image_pixels};
use imageproc::morphology::{dilate, erode};

// -- Kernel helpers -----------------------------------------------------------

/// Round `value` to an odd kernel size within `[min, max]`.
pub fn odd_kernel(value: f32, min: u32, max: u32) -> u32 {
    let min = min.max(1);
    let max = max.max(min);
    let mut k = (value.round().max(0.0) as u32).clamp(min, max);
    if k % 2 == 0 {
        k = if k < max { k + 1 } else { k.saturating_sub(1).max(1) };
    }
    k
}

/// Gaussian sigma for a kernel of side `ksize`, using the usual
/// `0.3 * ((ksize - 1) / 2 - 1) + 0.8` rule. Never returns less than 0.5.
pub fn sigma_for_kernel(ksize: u32) -> f32 {
    let k = ksize.max(1) as f32;
    (0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8).max(0.5)
}

// -- Thresholds ---------------------------------------------------------------

/// Pixels strictly above `level` become 255, the rest 0.
pub fn threshold_above(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] > level { 255 } else { 0 }])
    })
}

/// Morphological closing (dilate then erode) with a square element of side
/// `size`.
pub fn close_square(mask: &GrayImage, size: u32) -> GrayImage {
    let radius = (size / 2).min(u8::MAX as u32) as u8;
    if radius == 0 {
        return mask.clone();
    }
    let dilated = dilate(mask, Norm::LInf, radius);
    erode(&dilated, Norm::LInf, radius)
}

/// Square-window means over a grayscale image, backed by a summed-area table.
/// Windows are clipped at the borders rather than padded.
pub struct BoxMeans {
    sums: Image<Luma<u64>>,
    width: u32,
    height: u32,
}

impl BoxMeans {
    pub fn new(gray: &GrayImage) -> Self {
        Self {
            sums: integral_image::<_, u64>(gray),
            width: gray.width(),
            height: gray.height(),
        }
    }

    /// Mean of the `(2 * radius + 1)`-wide square centred on `(x, y)`.
    pub fn mean(&self, x: u32, y: u32, radius: u32) -> f64 {
        if self.width == 0 || self.height == 0 {
            return 128.0;
        }
        let (left, top) = (x.saturating_sub(radius), y.saturating_sub(radius));
        let right = x.saturating_add(radius).min(self.width - 1);
        let bottom = y.saturating_add(radius).min(self.height - 1);
        let area = f64::from(right - left + 1) * f64::from(bottom - top + 1);
        sum_image_pixels(&self.sums, left, top, right, bottom)[0] as f64 / area
    }
}

/// Local-mean adaptive threshold: a pixel is white unless it is darker than
/// the mean of its `block_radius` neighbourhood minus `c`.
pub fn adaptive_mean_threshold(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let means = BoxMeans::new(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let threshold = (means.mean(x, y, block_radius) as i32 - c).clamp(0, 255) as u8;
        Luma([if gray.get_pixel(x, y).0[0] < threshold { 0 } else { 255 }])
    })
}

/// Divide each pixel by its box-mean neighbourhood (scaled to 255). A cheap
/// illumination flattening used by the legacy black-and-white preset.
pub fn normalize_by_box_mean(gray: &GrayImage, radius: u32) -> GrayImage {
    let means = BoxMeans::new(gray);
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let mean = means.mean(x, y, radius).max(1.0);
        let value = f64::from(gray.get_pixel(x, y).0[0]);
        Luma([(value * 255.0 / mean).round().clamp(0.0, 255.0) as u8])
    })
}

/// Gaussian-weighted adaptive threshold with a `block`-sized window.
/// White where the pixel is above the local weighted mean minus `c`.
pub fn adaptive_gaussian_threshold(gray: &GrayImage, block: u32, c: i32) -> GrayImage {
    let local = gaussian_blur_f32(gray, sigma_for_kernel(block));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as i32;
        let threshold = local.get_pixel(x, y).0[0] as i32 - c;
        Luma([if value > threshold { 255 } else { 0 }])
    })
}

// -- Background flattening ----------------------------------------------------

/// Estimate the paper background with a large median blur and divide it out,
/// so shadows and lighting gradients flatten to white.
pub fn flatten_background(gray: &GrayImage, kernel: u32) -> GrayImage {
    let radius = kernel / 2;
    let background = median_filter(gray, radius, radius);
    divide_by_background(gray, &background)
}

/// `pixel / background * 255`, saturating.
pub fn divide_by_background(gray: &GrayImage, background: &GrayImage) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y).0[0] as f32;
        let bg = background.get_pixel(x, y).0[0].max(1) as f32;
        Luma([(value * 255.0 / bg).round().clamp(0.0, 255.0) as u8])
    })
}

// -- Contrast -----------------------------------------------------------------

/// Contrast Limited Adaptive Histogram Equalization.
///
/// The image is split into `tiles x tiles` regions; each gets a clipped
/// histogram (clip = `clip_limit * tile_pixels / 256`, excess redistributed
/// evenly) and a CDF lookup table. Pixels blend the four nearest tile
/// mappings bilinearly to avoid block seams.
pub fn clahe(gray: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let tiles_x = (tiles as usize).min(w.max(1));
    let tiles_y = (tiles as usize).min(h.max(1));
    if w == 0 || h == 0 || tiles_x == 0 || tiles_y == 0 {
        return gray.clone();
    }
    let tile_w = w / tiles_x;
    let tile_h = h / tiles_y;
    if tile_w < 2 || tile_h < 2 {
        return gray.clone();
    }

    let raw = gray.as_raw();
    let mut maps = vec![[0u8; 256]; tiles_x * tiles_y];

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = if tx == tiles_x - 1 { w } else { x0 + tile_w };
            let y1 = if ty == tiles_y - 1 { h } else { y0 + tile_h };
            let tile_pixels = (x1 - x0) * (y1 - y0);

            let mut hist = [0u32; 256];
            for row in y0..y1 {
                for &v in &raw[row * w + x0..row * w + x1] {
                    hist[v as usize] += 1;
                }
            }

            let clip = ((clip_limit * tile_pixels as f32 / 256.0) as u32).max(1);
            let mut excess = 0u32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let per_bin = excess / 256;
            let remainder = (excess % 256) as usize;
            for (i, bin) in hist.iter_mut().enumerate() {
                *bin += per_bin;
                if i < remainder {
                    *bin += 1;
                }
            }

            let map = &mut maps[ty * tiles_x + tx];
            let mut cdf = 0u32;
            let scale = 255.0 / tile_pixels as f32;
            for (i, &count) in hist.iter().enumerate() {
                cdf += count;
                map[i] = (cdf as f32 * scale).round().min(255.0) as u8;
            }
        }
    }

    let tw = tile_w as f32;
    let th = tile_h as f32;
    let last_tx = tiles_x as i32 - 1;
    let last_ty = tiles_y as i32 - 1;

    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let value = raw[y as usize * w + x as usize] as usize;

        let fx = (x as f32 + 0.5) / tw - 0.5;
        let fy = (y as f32 + 0.5) / th - 0.5;
        let tx0 = (fx.floor() as i32).clamp(0, last_tx) as usize;
        let tx1 = (fx.floor() as i32 + 1).clamp(0, last_tx) as usize;
        let ty0 = (fy.floor() as i32).clamp(0, last_ty) as usize;
        let ty1 = (fy.floor() as i32 + 1).clamp(0, last_ty) as usize;
        let ax = (fx - fx.floor()).clamp(0.0, 1.0);
        let ay = (fy - fy.floor()).clamp(0.0, 1.0);

        let v00 = maps[ty0 * tiles_x + tx0][value] as f32;
        let v10 = maps[ty0 * tiles_x + tx1][value] as f32;
        let v01 = maps[ty1 * tiles_x + tx0][value] as f32;
        let v11 = maps[ty1 * tiles_x + tx1][value] as f32;

        let top = v00 * (1.0 - ax) + v10 * ax;
        let bottom = v01 * (1.0 - ax) + v11 * ax;
        Luma([(top * (1.0 - ay) + bottom * ay).round().clamp(0.0, 255.0) as u8])
    })
}

/// Sharpen by blending the image with its own Gaussian blur:
/// `(1 + amount) * img - amount * blur`.
pub fn unsharp_mask(gray: &GrayImage, sigma: f32, amount: f32) -> GrayImage {
    let blurred = gaussian_blur_f32(gray, sigma.max(0.1));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = gray.get_pixel(x, y).0[0] as f32;
        let b = blurred.get_pixel(x, y).0[0] as f32;
        Luma([((1.0 + amount) * v - amount * b).round().clamp(0.0, 255.0) as u8])
    })
}

/// 256-entry lookup table for `255 * (v / 255) ^ gamma`.
pub fn gamma_lut(gamma: f32) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let normalised = i as f32 / 255.0;
        *entry = (normalised.powf(gamma) * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    lut
}

pub fn apply_lut(gray: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    let mut out = gray.clone();
    for pixel in out.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
    out
}

// -- Colour space -------------------------------------------------------------

/// Separate luminance (Y) and chrominance (Cr, Cb) planes of an RGB image.
pub struct YCrCbPlanes {
    pub y: GrayImage,
    pub cr: GrayImage,
    pub cb: GrayImage,
}

pub fn rgb_to_ycrcb(rgb: &RgbImage) -> YCrCbPlanes {
    let (w, h) = rgb.dimensions();
    let mut y_plane = GrayImage::new(w, h);
    let mut cr_plane = GrayImage::new(w, h);
    let mut cb_plane = GrayImage::new(w, h);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0.map(|c| c as f32);
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        let cr = (r - luma) * 0.713 + 128.0;
        let cb = (b - luma) * 0.564 + 128.0;
        y_plane.put_pixel(x, y, Luma([to_u8(luma)]));
        cr_plane.put_pixel(x, y, Luma([to_u8(cr)]));
        cb_plane.put_pixel(x, y, Luma([to_u8(cb)]));
    }

    YCrCbPlanes {
        y: y_plane,
        cr: cr_plane,
        cb: cb_plane,
    }
}

pub fn ycrcb_to_rgb(planes: &YCrCbPlanes) -> RgbImage {
    RgbImage::from_fn(planes.y.width(), planes.y.height(), |x, y| {
        let luma = planes.y.get_pixel(x, y).0[0] as f32;
        let cr = planes.cr.get_pixel(x, y).0[0] as f32 - 128.0;
        let cb = planes.cb.get_pixel(x, y).0[0] as f32 - 128.0;
        Rgb([
            to_u8(luma + 1.403 * cr),
            to_u8(luma - 0.714 * cr - 0.344 * cb),
            to_u8(luma + 1.773 * cb),
        ])
    })
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
