// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — boundary detection, perspective rectification, text
// hints and fallback cropping, tone enhancement, and the pipeline driver.

pub mod detect;
pub mod enhance;
pub mod geometry;
pub mod pipeline;
pub mod rectify;
pub mod text;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use detect::{BoundaryDetector, DetectionContext};
pub use enhance::ScanEnhancer;
pub use geometry::{ContourGeometry, DocumentGeometry};
pub use pipeline::{OutcomeKind, ProcessedDocument, ScanOutcome, ScanPipeline, ScanReport};
pub use rectify::{target_dimensions, warp_to_rectangle};
pub use text::{FixedTextDetector, NoTextDetector, TextDetector, crop_to_text_bounds};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsTextDetector};
