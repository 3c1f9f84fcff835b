// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text-region hints — the detector seam and the text-bounds fallback crop.

use flatscan_core::error::Result;
use flatscan_core::{TextBlock, TextBoundsRect};
use image::RgbaImage;
use tracing::debug;

use crate::image::processor::ImageProcessor;

/// Locates blocks of text in an upright image.
///
/// Implementations report boxes in the image's own pixel coordinates. An
/// error is treated by the pipeline as "no text found", so detectors should
/// only fail for genuine engine faults.
pub trait TextDetector {
    fn detect_text_blocks(&self, image: &RgbaImage) -> Result<Vec<TextBlock>>;
}

/// Detector that never finds text. Boundary detection then runs unbiased.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextDetector;

impl TextDetector for NoTextDetector {
    fn detect_text_blocks(&self, _image: &RgbaImage) -> Result<Vec<TextBlock>> {
        Ok(Vec::new())
    }
}

/// Detector returning a fixed set of blocks, e.g. from an upstream engine
/// that already ran or from a user-supplied hint.
#[derive(Debug, Clone, Default)]
pub struct FixedTextDetector {
    blocks: Vec<TextBlock>,
}

impl FixedTextDetector {
    pub fn new(blocks: Vec<TextBlock>) -> Self {
        Self { blocks }
    }
}

impl TextDetector for FixedTextDetector {
    fn detect_text_blocks(&self, _image: &RgbaImage) -> Result<Vec<TextBlock>> {
        Ok(self.blocks.clone())
    }
}

/// Crop `image` to `bounds`, clamped to the image.
///
/// Returns `None` when the clamped region is 1 px or less on either axis.
pub fn crop_to_text_bounds(image: &RgbaImage, bounds: &TextBoundsRect) -> Option<RgbaImage> {
    let (width, height) = image.dimensions();
    let left = bounds.left.clamp(0, width as i32);
    let top = bounds.top.clamp(0, height as i32);
    let right = bounds.right.clamp(0, width as i32);
    let bottom = bounds.bottom.clamp(0, height as i32);

    let crop_w = right - left;
    let crop_h = bottom - top;
    if crop_w <= 1 || crop_h <= 1 {
        debug!(crop_w, crop_h, "Text bounds too small to crop");
        return None;
    }

    let cropped = ImageProcessor::from_rgba(image.clone())
        .crop(left as u32, top as u32, crop_w as u32, crop_h as u32)
        .into_rgba();
    Some(cropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn fixed_detector_returns_its_blocks() {
        let blocks = vec![TextBlock::new(1, 2, 3, 4)];
        let detector = FixedTextDetector::new(blocks.clone());
        assert_eq!(detector.detect_text_blocks(&gradient(5, 5)).unwrap(), blocks);
        assert!(NoTextDetector.detect_text_blocks(&gradient(5, 5)).unwrap().is_empty());
    }

    #[test]
    fn crop_takes_the_bounded_region() {
        let bounds = TextBoundsRect { left: 10, top: 20, right: 40, bottom: 60 };
        let out = crop_to_text_bounds(&gradient(100, 100), &bounds).unwrap();
        assert_eq!(out.dimensions(), (30, 40));
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 0, 255]);
    }

    #[test]
    fn crop_clamps_to_image() {
        let bounds = TextBoundsRect { left: -5, top: 50, right: 500, bottom: 500 };
        let out = crop_to_text_bounds(&gradient(100, 80), &bounds).unwrap();
        assert_eq!(out.dimensions(), (100, 30));
    }

    #[test]
    fn crop_rejects_slivers() {
        let image = gradient(100, 100);
        let thin = TextBoundsRect { left: 10, top: 10, right: 11, bottom: 90 };
        assert!(crop_to_text_bounds(&image, &thin).is_none());
        let outside = TextBoundsRect { left: 150, top: 150, right: 200, bottom: 200 };
        assert!(crop_to_text_bounds(&image, &outside).is_none());
    }
}
