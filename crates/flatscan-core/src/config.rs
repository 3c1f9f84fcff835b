// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::types::PageSize;

/// Tuning parameters for the scan pipeline.
///
/// `Default` reproduces the reference behaviour; every field can be
/// overridden from a JSON file via [`ScanConfig::load`]. Missing fields in
/// the file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Longest side of the working copy used for boundary detection.
    pub detection_max_dimension: u32,
    /// Gaussian blur sigma applied before edge detection.
    pub blur_sigma: f32,
    /// Canny hysteresis thresholds.
    pub canny_low: f32,
    pub canny_high: f32,
    /// Radius of the square closing kernel (2 => 5x5).
    pub close_radius: u8,
    /// Polygon approximation tolerance as a fraction of contour perimeter.
    pub approx_epsilon: f64,
    /// Minimum quad area as a fraction of the working image area.
    pub min_quad_area: f64,
    /// Minimum bounding-box side ratio (short / long) for a quad.
    pub min_aspect_ratio: f64,
    /// Minimum contour area for the rotated-rectangle fallback.
    pub fallback_min_area: f64,
    /// Adaptive threshold neighbourhood size (odd).
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean before thresholding.
    pub threshold_constant: i32,
    /// Padding added around the text union, per side, as a fraction.
    pub text_padding: f32,
    pub contrast: f32,
    /// Brightness offset as a fraction of full scale.
    pub brightness: f32,
    pub jpeg_quality: u8,
    pub page_size: PageSize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            detection_max_dimension: 1280,
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            close_radius: 2,
            approx_epsilon: 0.02,
            min_quad_area: 0.2,
            min_aspect_ratio: 0.3,
            fallback_min_area: 0.1,
            threshold_block_size: 11,
            threshold_constant: 2,
            text_padding: 0.05,
            contrast: 1.25,
            brightness: 0.03,
            jpeg_quality: 92,
            page_size: PageSize::default(),
        }
    }
}

impl ScanConfig {
    /// Read a JSON configuration file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.detection_max_dimension == 0 {
            return Err(ScanError::Config(
                "detection_max_dimension must be positive".into(),
            ));
        }
        if self.blur_sigma <= 0.0 {
            return Err(ScanError::Config(format!(
                "blur_sigma must be positive, got {}",
                self.blur_sigma
            )));
        }
        if self.canny_low > self.canny_high {
            return Err(ScanError::Config(format!(
                "canny_low ({}) exceeds canny_high ({})",
                self.canny_low, self.canny_high
            )));
        }
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(ScanError::Config(format!(
                "threshold_block_size must be odd and >= 3, got {}",
                self.threshold_block_size
            )));
        }
        for (name, value) in [
            ("approx_epsilon", self.approx_epsilon),
            ("min_quad_area", self.min_quad_area),
            ("min_aspect_ratio", self.min_aspect_ratio),
            ("fallback_min_area", self.fallback_min_area),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::Config(format!(
                    "{name} must be within 0..=1, got {value}"
                )));
            }
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ScanError::Config(format!(
                "jpeg_quality must be within 1..=100, got {}",
                self.jpeg_quality
            )));
        }
        if self.page_size.width_pt <= 0.0 || self.page_size.height_pt <= 0.0 {
            return Err(ScanError::Config("page size must be positive".into()));
        }
        Ok(())
    }
}
