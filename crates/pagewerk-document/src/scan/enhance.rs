// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement presets — background flattening, contrast, sharpening,
// and binarization for rectified document pages.

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::filter::median_filter;
use pagewerk_core::{EnhanceConfig, Preset};
use tracing::{debug, instrument};

use crate::scan::filters::{
    YCrCbPlanes, adaptive_gaussian_threshold, adaptive_mean_threshold, apply_lut, clahe,
    flatten_background, gamma_lut, normalize_by_box_mean, odd_kernel, rgb_to_ycrcb,
    unsharp_mask, ycrcb_to_rgb,
};

/// Box-mean radius of the legacy black-and-white preset.
const LEGACY_BW_NORMALIZE_RADIUS: u32 = 31;
/// Local-mean block radius and offset of the legacy black-and-white preset.
const LEGACY_BW_BLOCK_RADIUS: u32 = 15;
const LEGACY_BW_C: i32 = 10;

/// Applies enhancement presets to rectified pages.
///
/// Every preset is a pure function of the input image; intermediates are
/// dropped before the method returns. Enhancement cannot fail.
pub struct ScanEnhancer<'a> {
    config: &'a EnhanceConfig,
}

impl<'a> ScanEnhancer<'a> {
    pub fn new(config: &'a EnhanceConfig) -> Self {
        Self { config }
    }

    /// Run `preset` over `image`.
    #[instrument(skip(self, image), fields(preset = preset.name(), width = image.width(), height = image.height()))]
    pub fn apply(&self, image: &DynamicImage, preset: Preset) -> DynamicImage {
        let out = match preset {
            Preset::AutoPro => DynamicImage::ImageLuma8(self.auto_pro(&image.to_luma8())),
            Preset::ColorPro => DynamicImage::ImageRgb8(self.color_pro(&image.to_rgb8())),
            Preset::BwPro => DynamicImage::ImageLuma8(self.bw_pro(&image.to_luma8())),
            Preset::ColorClean => DynamicImage::ImageRgb8(self.color_clean(&image.to_rgb8())),
            Preset::Bw => DynamicImage::ImageLuma8(legacy_bw(&image.to_luma8())),
            Preset::Minimal => DynamicImage::ImageLuma8(self.minimal(&image.to_luma8())),
        };
        debug!(channels = out.color().channel_count(), "Enhancement applied");
        out
    }

    // -- Presets --------------------------------------------------------------

    /// Flattened, mildly equalised, sharpened grayscale with brightened
    /// midtones.
    pub fn auto_pro(&self, gray: &GrayImage) -> GrayImage {
        let cfg = self.config;
        let flat = flatten_background(gray, self.background_kernel(gray));
        let equalised = clahe(&flat, cfg.clahe_tiles, cfg.mild_clahe_clip);
        let sharp = unsharp_mask(&equalised, cfg.unsharp_sigma, cfg.unsharp_amount);
        apply_lut(&sharp, &gamma_lut(cfg.gamma))
    }

    /// Background flattening and CLAHE on luminance only; chroma is kept.
    pub fn color_pro(&self, rgb: &RgbImage) -> RgbImage {
        let planes = rgb_to_ycrcb(rgb);
        let flat = flatten_background(&planes.y, self.background_kernel(&planes.y));
        let y = clahe(&flat, self.config.clahe_tiles, self.config.mild_clahe_clip);
        ycrcb_to_rgb(&YCrCbPlanes { y, ..planes })
    }

    /// Flattened grayscale binarised with a Gaussian-weighted local threshold.
    pub fn bw_pro(&self, gray: &GrayImage) -> GrayImage {
        let cfg = self.config;
        let flat = flatten_background(gray, self.background_kernel(gray));
        let block = odd_kernel(
            min_side(gray) as f32 * cfg.adaptive_block_factor,
            cfg.adaptive_block_min,
            u32::MAX - 1,
        );
        debug!(block, c = cfg.adaptive_c, "Adaptive threshold window");
        adaptive_gaussian_threshold(&flat, block, cfg.adaptive_c)
    }

    /// Legacy colour clean-up: 3x3 median per channel, CLAHE on luminance,
    /// then unsharp mask on luminance.
    pub fn color_clean(&self, rgb: &RgbImage) -> RgbImage {
        let cfg = self.config;
        let denoised = median_filter(rgb, cfg.denoise_radius, cfg.denoise_radius);
        let planes = rgb_to_ycrcb(&denoised);
        let equalised = clahe(&planes.y, cfg.clahe_tiles, cfg.clahe_clip);
        let y = unsharp_mask(&equalised, cfg.unsharp_sigma, cfg.unsharp_amount);
        ycrcb_to_rgb(&YCrCbPlanes { y, ..planes })
    }

    pub fn minimal(&self, gray: &GrayImage) -> GrayImage {
        clahe(gray, self.config.clahe_tiles, self.config.clahe_clip)
    }

    /// Odd median kernel proportional to the smaller image side.
    fn background_kernel(&self, gray: &GrayImage) -> u32 {
        let cfg = self.config;
        odd_kernel(
            min_side(gray) as f32 * cfg.median_kernel_factor,
            cfg.median_kernel_min,
            cfg.median_kernel_max,
        )
    }
}

/// Legacy black-and-white: box-mean illumination normalisation followed by a
/// fixed local-mean threshold.
fn legacy_bw(gray: &GrayImage) -> GrayImage {
    let normalised = normalize_by_box_mean(gray, LEGACY_BW_NORMALIZE_RADIUS);
    adaptive_mean_threshold(&normalised, LEGACY_BW_BLOCK_RADIUS, LEGACY_BW_C)
}

fn min_side(gray: &GrayImage) -> u32 {
    gray.width().min(gray.height())
}

/// Enhance with a one-off enhancer.
pub fn enhance_image(image: &DynamicImage, preset: Preset, config: &EnhanceConfig) -> DynamicImage {
    ScanEnhancer::new(config).apply(image, preset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    /// Page with a left-to-right shadow and dark text strokes.
    fn shaded_page(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let paper = 230.0 - 110.0 * x as f32 / w as f32;
            let ink = (y % 20) < 3 && (x % 30) < 22 && x > 10 && x < w - 10;
            Luma([if ink { (paper * 0.25) as u8 } else { paper as u8 }])
        })
    }

    fn is_binary(gray: &GrayImage) -> bool {
        gray.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    #[test]
    fn bw_pro_binarises_and_keeps_text() {
        let page = shaded_page(240, 200);
        let out = enhance_image(&DynamicImage::ImageLuma8(page), Preset::BwPro, &EnhanceConfig::default());
        let DynamicImage::ImageLuma8(gray) = out else {
            panic!("bw_pro must produce grayscale");
        };
        assert!(is_binary(&gray));

        // Shaded paper on the right flattens to white.
        assert_eq!(gray.get_pixel(225, 10).0[0], 255);
        // Text stroke on the shaded side stays black.
        assert_eq!(gray.get_pixel(200, 41).0[0], 0);
        let black = gray.pixels().filter(|p| p.0[0] == 0).count();
        assert!(black > 500 && black < 240 * 200 / 3, "black pixels {black}");
    }

    #[test]
    fn auto_pro_flattens_shadow() {
        let page = shaded_page(240, 200);
        let before_spread = page.get_pixel(5, 10).0[0] as i32 - page.get_pixel(234, 10).0[0] as i32;
        let out = ScanEnhancer::new(&EnhanceConfig::default()).auto_pro(&page);
        let after_spread = out.get_pixel(5, 10).0[0] as i32 - out.get_pixel(234, 10).0[0] as i32;
        assert!(after_spread.abs() < before_spread.abs() / 2);
        // Ink remains darker than paper.
        assert!(out.get_pixel(120, 41).0[0] < out.get_pixel(120, 50).0[0]);
    }

    #[test]
    fn color_pro_preserves_chroma() {
        let rgb = RgbImage::from_fn(120, 100, |x, _| {
            let shade = 200 - (x as u8 / 2);
            Rgb([shade, shade / 2, 40])
        });
        let out = ScanEnhancer::new(&EnhanceConfig::default()).color_pro(&rgb);
        assert_eq!(out.dimensions(), (120, 100));
        let before = rgb.get_pixel(60, 50).0;
        let after = out.get_pixel(60, 50).0;
        // Red stays the dominant channel and blue the weakest.
        assert!(before[0] > before[2] && after[0] > after[2]);
    }

    #[test]
    fn legacy_presets_keep_their_layouts() {
        let cfg = EnhanceConfig::default();
        let rgb = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb([180, 170, 160])));
        assert!(matches!(enhance_image(&rgb, Preset::ColorClean, &cfg), DynamicImage::ImageRgb8(_)));

        let out = enhance_image(&rgb, Preset::Bw, &cfg);
        let DynamicImage::ImageLuma8(gray) = out else {
            panic!("legacy bw must produce grayscale");
        };
        assert!(is_binary(&gray));
        // Uniform paper has nothing darker than its local mean: all white.
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn minimal_is_grayscale_clahe() {
        let cfg = EnhanceConfig::default();
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 2) as u8, (y * 2) as u8, 100])
        }));
        let out = enhance_image(&img, Preset::Minimal, &cfg);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        assert_eq!((out.width(), out.height()), (64, 64));
    }

    #[test]
    fn unknown_preset_name_runs_minimal() {
        let cfg = EnhanceConfig::default();
        let img = DynamicImage::ImageLuma8(shaded_page(80, 60));
        let via_name = enhance_image(&img, Preset::from_name("sepia"), &cfg);
        let direct = enhance_image(&img, Preset::Minimal, &cfg);
        assert_eq!(via_name.as_bytes(), direct.as_bytes());
    }
}
