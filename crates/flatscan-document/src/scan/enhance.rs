// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement — desaturation followed by a fixed linear contrast and
// brightness lift, giving the flat "photocopy" look of a scanned page.

use flatscan_core::ScanConfig;
use image::{Rgba, RgbaImage};
use tracing::{debug, instrument};

/// Luma weights applied when removing saturation.
const LUMA_R: f32 = 0.213;
const LUMA_G: f32 = 0.715;
const LUMA_B: f32 = 0.072;

/// Grayscale-and-contrast enhancer for rectified or cropped scans.
///
/// Every colour channel becomes
/// `contrast * luma + (0.5 - 0.5 * contrast) * 255 + brightness * 255`,
/// clamped to `0..=255`. Alpha is passed through untouched. The output always
/// has the same dimensions as the input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanEnhancer {
    contrast: f32,
    brightness: f32,
}

impl Default for ScanEnhancer {
    fn default() -> Self {
        Self::new(1.25, 0.03)
    }
}

impl ScanEnhancer {
    /// `brightness` is a fraction of full scale (0.03 => +7.65 levels).
    pub fn new(contrast: f32, brightness: f32) -> Self {
        Self {
            contrast,
            brightness,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(config.contrast, config.brightness)
    }

    /// Constant term added after scaling.
    fn offset(&self) -> f32 {
        (-0.5 * self.contrast + 0.5) * 255.0 + self.brightness * 255.0
    }

    /// Map one luma value through the tone curve.
    pub fn tone(&self, luma: f32) -> u8 {
        (self.contrast * luma + self.offset()).round().clamp(0.0, 255.0) as u8
    }

    /// Produce the enhanced copy of `image`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn enhance(&self, image: &RgbaImage) -> RgbaImage {
        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            let [r, g, b, a] = pixel.0;
            let luma = LUMA_R * r as f32 + LUMA_G * g as f32 + LUMA_B * b as f32;
            let value = self.tone(luma);
            *pixel = Rgba([value, value, value, a]);
        }
        debug!(contrast = self.contrast, brightness = self.brightness, "Enhancement applied");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_curve_matches_reference_points() {
        let enhancer = ScanEnhancer::default();
        // offset = -31.875 + 7.65 = -24.225
        assert_eq!(enhancer.tone(0.0), 0);
        assert_eq!(enhancer.tone(100.0), 101);
        assert_eq!(enhancer.tone(128.0), 136);
        assert_eq!(enhancer.tone(255.0), 255);
    }

    #[test]
    fn output_is_gray_and_keeps_alpha() {
        let image = RgbaImage::from_fn(8, 6, |x, y| Rgba([(x * 30) as u8, (y * 40) as u8, 200, 77]));
        let out = ScanEnhancer::default().enhance(&image);

        assert_eq!(out.dimensions(), (8, 6));
        for pixel in out.pixels() {
            let [r, g, b, a] = pixel.0;
            assert_eq!(r, g);
            assert_eq!(g, b);
            assert_eq!(a, 77);
        }
    }

    #[test]
    fn pure_colours_use_luma_weights() {
        let enhancer = ScanEnhancer::default();
        let image = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([255, 0, 0, 255]),
            1 => Rgba([0, 255, 0, 255]),
            _ => Rgba([0, 0, 255, 255]),
        });
        let out = enhancer.enhance(&image);
        assert_eq!(out.get_pixel(0, 0).0[0], enhancer.tone(0.213 * 255.0));
        assert_eq!(out.get_pixel(1, 0).0[0], enhancer.tone(0.715 * 255.0));
        assert_eq!(out.get_pixel(2, 0).0[0], enhancer.tone(0.072 * 255.0));
        assert!(out.get_pixel(1, 0).0[0] > out.get_pixel(0, 0).0[0]);
    }

    #[test]
    fn configured_parameters_are_used() {
        let config = ScanConfig {
            contrast: 1.0,
            brightness: 0.0,
            ..ScanConfig::default()
        };
        let enhancer = ScanEnhancer::from_config(&config);
        assert_eq!(enhancer.tone(42.0), 42);
    }
}
