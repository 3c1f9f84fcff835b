// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-document — Turns photographs of pages into flat scans.
//
// Provides image decoding with orientation normalisation, document boundary
// detection and perspective rectification, text-region fallback cropping,
// tone enhancement, and single-page PDF output.

pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `flatscan_document::ScanPipeline` etc.
pub use crate::image::processor::ImageProcessor;
pub use pdf::writer::PdfWriter;
pub use scan::enhance::ScanEnhancer;
pub use scan::pipeline::{OutcomeKind, ProcessedDocument, ScanOutcome, ScanPipeline, ScanReport};
pub use scan::text::{FixedTextDetector, NoTextDetector, TextDetector};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsTextDetector;
