// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan pipeline — orientation, text hint, boundary detection, rectification
// or fallback crop, enhancement, and encoding.

use flatscan_core::error::{Result, ScanError};
use flatscan_core::{CornerPoints, ScanConfig, TextBoundsRect};
use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::enhance::ScanEnhancer;
use super::geometry::{ContourGeometry, DocumentGeometry};
use super::text::{NoTextDetector, TextDetector, crop_to_text_bounds};
use crate::image::processor::ImageProcessor;
use crate::pdf::writer::PdfWriter;

/// Best available flattened image, tagged with how it was obtained.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The document quad was found and warped flat.
    Rectified(RgbaImage),
    /// No usable quad; cropped to the padded text region.
    Cropped(RgbaImage),
    /// Neither worked; the upright input unchanged.
    Original(RgbaImage),
}

impl ScanOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Rectified(_) => OutcomeKind::Rectified,
            Self::Cropped(_) => OutcomeKind::Cropped,
            Self::Original(_) => OutcomeKind::Original,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        match self {
            Self::Rectified(image) | Self::Cropped(image) | Self::Original(image) => image,
        }
    }

    pub fn into_image(self) -> RgbaImage {
        match self {
            Self::Rectified(image) | Self::Cropped(image) | Self::Original(image) => image,
        }
    }
}

/// Which branch of the fallback chain produced the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Rectified,
    Cropped,
    Original,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub outcome: OutcomeKind,
    pub text_blocks: usize,
    pub text_bounds: Option<TextBoundsRect>,
    pub corners: Option<CornerPoints>,
    pub width: u32,
    pub height: u32,
}

/// Encoded pipeline output together with its report.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub jpeg: Vec<u8>,
    pub report: ScanReport,
}

/// Turns a photo of a page into a flat, enhanced scan.
///
/// Holds no per-call state, so one pipeline can serve concurrent requests.
pub struct ScanPipeline {
    config: ScanConfig,
    text_detector: Box<dyn TextDetector + Send + Sync>,
    geometry: Box<dyn DocumentGeometry + Send + Sync>,
    enhancer: ScanEnhancer,
}

impl Default for ScanPipeline {
    fn default() -> Self {
        Self::from_valid_config(ScanConfig::default())
    }
}

impl ScanPipeline {
    /// Pipeline with the contour geometry backend and no text detector.
    ///
    /// Rejects configurations the detector cannot run with, such as a
    /// non-positive blur sigma or an even threshold block.
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: ScanConfig) -> Self {
        Self {
            text_detector: Box::new(NoTextDetector),
            geometry: Box::new(ContourGeometry::new(&config)),
            enhancer: ScanEnhancer::from_config(&config),
            config,
        }
    }

    pub fn with_text_detector(mut self, detector: impl TextDetector + Send + Sync + 'static) -> Self {
        self.text_detector = Box::new(detector);
        self
    }

    pub fn with_geometry(mut self, geometry: impl DocumentGeometry + Send + Sync + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the text detector and reduce its blocks to one padded region.
    ///
    /// Detector failures count as "no text".
    fn text_hint(&self, image: &RgbaImage) -> (usize, Option<TextBoundsRect>) {
        let blocks = match self.text_detector.detect_text_blocks(image) {
            Ok(blocks) => blocks,
            Err(err) => {
                warn!(error = %err, "Text detection failed; continuing without a hint");
                Vec::new()
            }
        };
        let bounds = TextBoundsRect::from_blocks(
            &blocks,
            image.width(),
            image.height(),
            self.config.text_padding,
        );
        debug!(blocks = blocks.len(), ?bounds, "Text hint computed");
        (blocks.len(), bounds)
    }

    /// Resolve the fallback chain for an upright image, without enhancement.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn flatten(&self, image: &RgbaImage) -> (ScanOutcome, ScanReport) {
        let (text_blocks, text_bounds) = self.text_hint(image);
        let corners = self.geometry.find_document_quad(image, text_bounds.as_ref());

        let rectified = corners
            .as_ref()
            .and_then(|quad| self.geometry.warp_quad_to_rectangle(image, quad));

        let outcome = if let Some(flat) = rectified {
            ScanOutcome::Rectified(flat)
        } else if let Some(cropped) = text_bounds
            .as_ref()
            .and_then(|bounds| crop_to_text_bounds(image, bounds))
        {
            warn!("No rectifiable boundary; cropped to text region");
            ScanOutcome::Cropped(cropped)
        } else {
            warn!("No boundary and no usable text region; keeping the full image");
            ScanOutcome::Original(image.clone())
        };

        let report = ScanReport {
            outcome: outcome.kind(),
            text_blocks,
            text_bounds,
            corners,
            width: outcome.image().width(),
            height: outcome.image().height(),
        };
        info!(outcome = ?report.outcome, width = report.width, height = report.height, "Page flattened");
        (outcome, report)
    }

    /// Flatten and enhance an upright image.
    pub fn process_image(&self, image: &RgbaImage) -> (RgbaImage, ScanReport) {
        let (outcome, report) = self.flatten(image);
        let enhanced = self.enhancer.enhance(outcome.image());
        (enhanced, report)
    }

    /// Decode, process and JPEG-encode one photo.
    ///
    /// Fails with [`ScanError::InvalidInput`] when the bytes cannot be
    /// decoded and [`ScanError::ProcessingFailed`] when encoding fails.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn run(&self, bytes: &[u8]) -> Result<ProcessedDocument> {
        let processor = ImageProcessor::from_bytes(bytes)
            .map_err(|err| ScanError::InvalidInput(err.to_string()))?;
        let (enhanced, report) = self.process_image(processor.as_rgba());

        let jpeg = ImageProcessor::from_rgba(enhanced)
            .to_jpeg_bytes(self.config.jpeg_quality)
            .map_err(|err| ScanError::ProcessingFailed(err.to_string()))?;
        debug!(jpeg_len = jpeg.len(), "Scan encoded");
        Ok(ProcessedDocument { jpeg, report })
    }

    /// Byte-level entry point: the processed JPEG, or the input unchanged
    /// when it cannot be decoded or the result cannot be encoded.
    pub fn process_document(&self, bytes: &[u8]) -> Vec<u8> {
        match self.run(bytes) {
            Ok(document) => document.jpeg,
            Err(err) => {
                warn!(error = %err, "Returning input bytes unchanged");
                bytes.to_vec()
            }
        }
    }

    /// Locate the document boundary only, in upright source coordinates.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn detect(&self, bytes: &[u8]) -> Result<Option<CornerPoints>> {
        let processor = ImageProcessor::from_bytes(bytes)
            .map_err(|err| ScanError::InvalidInput(err.to_string()))?;
        let (_, text_bounds) = self.text_hint(processor.as_rgba());
        Ok(self
            .geometry
            .find_document_quad(processor.as_rgba(), text_bounds.as_ref()))
    }

    /// Place the (upright) image on a single PDF page titled `title`.
    #[instrument(skip(self, bytes), fields(bytes_len = bytes.len()))]
    pub fn create_pdf(&self, bytes: &[u8], title: &str) -> Result<Vec<u8>> {
        let mut writer = PdfWriter::new(self.config.page_size);
        writer.set_title(title);
        writer.create_from_image(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatscan_core::{Point, TextBlock};
    use image::Rgba;

    use crate::scan::text::FixedTextDetector;

    fn encode_png(image: RgbaImage) -> Vec<u8> {
        ImageProcessor::from_rgba(image).to_png_bytes().unwrap()
    }

    fn card_photo() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(400, 500, Rgba([25, 25, 25, 255]));
        for y in 60..440 {
            for x in 50..350 {
                img.put_pixel(x, y, Rgba([235, 235, 235, 255]));
            }
        }
        img
    }

    struct FailingDetector;

    impl TextDetector for FailingDetector {
        fn detect_text_blocks(&self, _image: &RgbaImage) -> Result<Vec<TextBlock>> {
            Err(ScanError::OcrError("engine offline".into()))
        }
    }

    /// Finds a quad but can never warp it.
    struct UnwarpableGeometry;

    impl DocumentGeometry for UnwarpableGeometry {
        fn find_document_quad(
            &self,
            _image: &RgbaImage,
            _text_bounds: Option<&TextBoundsRect>,
        ) -> Option<CornerPoints> {
            Some(CornerPoints::from_unordered([
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ]))
        }

        fn warp_quad_to_rectangle(&self, _image: &RgbaImage, _corners: &CornerPoints) -> Option<RgbaImage> {
            None
        }
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        for config in [
            ScanConfig { blur_sigma: 0.0, ..ScanConfig::default() },
            ScanConfig { threshold_block_size: 0, ..ScanConfig::default() },
        ] {
            assert!(matches!(ScanPipeline::new(config), Err(ScanError::Config(_))));
        }
        assert!(ScanPipeline::new(ScanConfig::default()).is_ok());
    }

    #[test]
    fn blank_page_is_kept_and_enhanced() {
        let image = RgbaImage::from_pixel(200, 300, Rgba([150, 150, 150, 255]));
        let (out, report) = ScanPipeline::default().process_image(&image);

        assert_eq!(report.outcome, OutcomeKind::Original);
        assert_eq!(report.corners, None);
        assert_eq!(out.dimensions(), (200, 300));
        let expected = ScanEnhancer::default().tone(150.0);
        assert!(out.pixels().all(|p| p.0 == [expected, expected, expected, 255]));
    }

    #[test]
    fn centred_card_is_rectified_with_its_aspect() {
        let (outcome, report) = ScanPipeline::default().flatten(&card_photo());

        assert_eq!(outcome.kind(), OutcomeKind::Rectified);
        assert!(report.corners.is_some());
        let (w, h) = outcome.image().dimensions();
        let aspect = w as f32 / h as f32;
        let expected = 300.0 / 380.0;
        assert!(
            (aspect - expected).abs() / expected < 0.1,
            "aspect {aspect} vs {expected} ({w}x{h})"
        );
    }

    #[test]
    fn text_only_page_is_cropped_to_padded_bounds() {
        let image = RgbaImage::from_pixel(200, 200, Rgba([180, 180, 180, 255]));
        let pipeline = ScanPipeline::default()
            .with_text_detector(FixedTextDetector::new(vec![TextBlock::new(50, 50, 150, 100)]));

        let (outcome, report) = pipeline.flatten(&image);
        assert_eq!(outcome.kind(), OutcomeKind::Cropped);
        assert_eq!(report.text_blocks, 1);
        assert_eq!(
            report.text_bounds,
            Some(TextBoundsRect { left: 45, top: 47, right: 155, bottom: 103 })
        );
        assert_eq!(outcome.image().dimensions(), (110, 56));
    }

    #[test]
    fn failed_warp_falls_back_to_crop() {
        let image = RgbaImage::from_pixel(100, 100, Rgba([180, 180, 180, 255]));
        let pipeline = ScanPipeline::default()
            .with_geometry(UnwarpableGeometry)
            .with_text_detector(FixedTextDetector::new(vec![TextBlock::new(20, 20, 60, 60)]));

        let (outcome, report) = pipeline.flatten(&image);
        assert_eq!(outcome.kind(), OutcomeKind::Cropped);
        assert!(report.corners.is_some());
    }

    #[test]
    fn text_detector_failure_is_no_text() {
        let image = RgbaImage::from_pixel(120, 90, Rgba([180, 180, 180, 255]));
        let pipeline = ScanPipeline::default().with_text_detector(FailingDetector);

        let (outcome, report) = pipeline.flatten(&image);
        assert_eq!(outcome.kind(), OutcomeKind::Original);
        assert_eq!(report.text_blocks, 0);
        assert_eq!(report.text_bounds, None);
    }

    #[test]
    fn undecodable_bytes_come_back_unchanged() {
        let garbage = b"this is certainly not a jpeg".to_vec();
        let pipeline = ScanPipeline::default();
        assert_eq!(pipeline.process_document(&garbage), garbage);
        assert!(matches!(pipeline.run(&garbage), Err(ScanError::InvalidInput(_))));
    }

    #[test]
    fn processed_output_is_jpeg_with_report() {
        let pipeline = ScanPipeline::default();
        let document = pipeline.run(&encode_png(card_photo())).unwrap();

        assert_eq!(&document.jpeg[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory(&document.jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (document.report.width, document.report.height));

        let json = serde_json::to_value(&document.report).unwrap();
        assert_eq!(json["outcome"], "rectified");
    }

    #[test]
    fn detect_reports_corners() {
        let corners = ScanPipeline::default()
            .detect(&encode_png(card_photo()))
            .unwrap()
            .expect("card should be detected");
        assert!((corners.top_left.x - 50.0).abs() < 5.0);
        assert!((corners.bottom_right.y - 439.0).abs() < 5.0);
    }

    #[test]
    fn pdf_from_photo() {
        let pipeline = ScanPipeline::default();
        let pdf = pipeline.create_pdf(&encode_png(card_photo()), "Card").unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert!(matches!(
            pipeline.create_pdf(b"nope", "Card"),
            Err(ScanError::InvalidInput(_))
        ));
    }
}
