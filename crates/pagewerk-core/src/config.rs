// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Every tunable constant of detection, paper
// matching, and enhancement lives here so callers can tune without
// recompiling.

use serde::{Deserialize, Serialize};

use crate::error::{PagewerkError, Result};

/// Complete tuning record for one scan pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub detector: DetectorConfig,
    pub paper: PaperConfig,
    pub enhance: EnhanceConfig,
}

impl ScanConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.paper.validate()?;
        self.enhance.validate()
    }
}

/// Quad detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Longer side of the working copy used for detection.
    pub max_dimension: u32,
    /// Gaussian blur kernel size (odd).
    pub blur_kernel: u32,
    /// Side of the square structuring element for morphological closing.
    pub close_kernel: u32,
    /// Canny hysteresis thresholds for the edge pass.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Number of largest contours examined.
    pub max_candidates: usize,
    /// Accepted contour area as a fraction of the working image area.
    pub min_area_ratio: f32,
    pub max_area_ratio: f32,
    /// Douglas-Peucker epsilon as a fraction of the contour perimeter.
    pub epsilon_factor: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1000,
            blur_kernel: 5,
            close_kernel: 5,
            canny_low: 50.0,
            canny_high: 150.0,
            max_candidates: 15,
            min_area_ratio: 0.10,
            max_area_ratio: 0.98,
            epsilon_factor: 0.03,
        }
    }
}

impl DetectorConfig {
    fn validate(&self) -> Result<()> {
        if self.max_dimension < 32 {
            return Err(invalid("detector.max_dimension must be at least 32"));
        }
        if self.blur_kernel == 0 || self.close_kernel == 0 {
            return Err(invalid("detector kernels must be non-zero"));
        }
        if self.canny_low < 0.0 || self.canny_high < self.canny_low {
            return Err(invalid("detector.canny_high must be >= canny_low >= 0"));
        }
        if self.max_candidates == 0 {
            return Err(invalid("detector.max_candidates must be non-zero"));
        }
        if !(0.0..1.0).contains(&self.min_area_ratio)
            || !(0.0..=1.0).contains(&self.max_area_ratio)
            || self.min_area_ratio >= self.max_area_ratio
        {
            return Err(invalid(
                "detector area ratios must satisfy 0 <= min < max <= 1",
            ));
        }
        if !(self.epsilon_factor > 0.0 && self.epsilon_factor < 1.0) {
            return Err(invalid("detector.epsilon_factor must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Paper normalizer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    /// Relative tolerance when comparing aspect ratios.
    pub tolerance: f32,
    /// Resolution of the rectified canvas when a paper size matches.
    pub dpi: u32,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.08,
            dpi: 200,
        }
    }
}

impl PaperConfig {
    fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(invalid("paper.tolerance must be in (0, 1)"));
        }
        if self.dpi == 0 || self.dpi > 1200 {
            return Err(invalid("paper.dpi must be in 1..=1200"));
        }
        Ok(())
    }
}

/// Enhancement preset parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// CLAHE clip limit for the legacy and minimal presets.
    pub clahe_clip: f32,
    /// CLAHE clip limit for `auto_pro` and `color_pro`.
    pub mild_clahe_clip: f32,
    /// CLAHE tile grid (tiles per axis).
    pub clahe_tiles: u32,
    /// Background median kernel as a fraction of the smaller dimension.
    pub median_kernel_factor: f32,
    pub median_kernel_min: u32,
    pub median_kernel_max: u32,
    /// Unsharp mask weight and blur sigma.
    pub unsharp_amount: f32,
    pub unsharp_sigma: f32,
    /// Output gamma; below 1.0 brightens midtones.
    pub gamma: f32,
    /// Adaptive threshold block as a fraction of the smaller dimension.
    pub adaptive_block_factor: f32,
    pub adaptive_block_min: u32,
    /// Constant subtracted from the local mean before thresholding.
    pub adaptive_c: i32,
    /// Median radius for the legacy colour denoise step.
    pub denoise_radius: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            clahe_clip: 2.0,
            mild_clahe_clip: 1.5,
            clahe_tiles: 8,
            median_kernel_factor: 0.035,
            median_kernel_min: 9,
            median_kernel_max: 101,
            unsharp_amount: 0.6,
            unsharp_sigma: 1.5,
            gamma: 0.85,
            adaptive_block_factor: 0.025,
            adaptive_block_min: 11,
            adaptive_c: 10,
            denoise_radius: 1,
        }
    }
}

impl EnhanceConfig {
    fn validate(&self) -> Result<()> {
        if self.clahe_clip <= 0.0 || self.mild_clahe_clip <= 0.0 {
            return Err(invalid("enhance CLAHE clip limits must be positive"));
        }
        if self.clahe_tiles == 0 {
            return Err(invalid("enhance.clahe_tiles must be non-zero"));
        }
        if self.median_kernel_factor <= 0.0
            || self.median_kernel_min == 0
            || self.median_kernel_min > self.median_kernel_max
        {
            return Err(invalid(
                "enhance median kernel bounds must satisfy 0 < min <= max",
            ));
        }
        if self.unsharp_sigma <= 0.0 || self.unsharp_amount < 0.0 {
            return Err(invalid("enhance unsharp parameters out of range"));
        }
        if self.gamma <= 0.0 {
            return Err(invalid("enhance.gamma must be positive"));
        }
        if self.adaptive_block_factor <= 0.0 || self.adaptive_block_min < 3 {
            return Err(invalid("enhance adaptive block parameters out of range"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> PagewerkError {
    PagewerkError::InvalidConfig(msg.to_string())
}
