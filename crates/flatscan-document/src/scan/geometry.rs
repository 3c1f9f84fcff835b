// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry backend seam — quad search and perspective warp behind one trait,
// so the pipeline can run on alternative vision stacks.

use flatscan_core::{CornerPoints, ScanConfig, TextBoundsRect};
use image::RgbaImage;

use super::detect::BoundaryDetector;
use super::rectify::warp_to_rectangle;

/// Low-level geometry operations used by the scan pipeline.
pub trait DocumentGeometry {
    /// Find the document outline, optionally biased by a text region given
    /// in source coordinates.
    fn find_document_quad(
        &self,
        image: &RgbaImage,
        text_bounds: Option<&TextBoundsRect>,
    ) -> Option<CornerPoints>;

    /// Flatten the quad into an upright rectangle.
    fn warp_quad_to_rectangle(&self, image: &RgbaImage, corners: &CornerPoints) -> Option<RgbaImage>;
}

/// Contour-based backend built on `imageproc`.
#[derive(Debug, Clone)]
pub struct ContourGeometry {
    detector: BoundaryDetector,
}

impl ContourGeometry {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            detector: BoundaryDetector::new(config),
        }
    }
}

impl Default for ContourGeometry {
    fn default() -> Self {
        Self::new(&ScanConfig::default())
    }
}

impl DocumentGeometry for ContourGeometry {
    fn find_document_quad(
        &self,
        image: &RgbaImage,
        text_bounds: Option<&TextBoundsRect>,
    ) -> Option<CornerPoints> {
        self.detector.detect(image, text_bounds)
    }

    fn warp_quad_to_rectangle(&self, image: &RgbaImage, corners: &CornerPoints) -> Option<RgbaImage> {
        warp_to_rectangle(image, corners)
    }
}
