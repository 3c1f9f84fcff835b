// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR-backed text detector.
//
// Locates text lines with the `ocrs` crate, a pure-Rust OCR engine backed by
// neural network models executed via `rten`. Only line geometry is used; the
// recognised characters are never read.
//
// # Feature Gate
//
// This module is only available when the `ocr` feature is enabled:
//
// ```toml
// flatscan-document = { path = "crates/flatscan-document", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine requires the detection model (`text-detection.rten`); the
// recognition model (`text-recognition.rten`) is loaded when present.
// Running the `ocrs` CLI once downloads both to `$XDG_CACHE_HOME/ocrs`
// (typically `~/.cache/ocrs`).

use std::path::{Path, PathBuf};

use flatscan_core::TextBlock;
use flatscan_core::error::{Result, ScanError};
use image::{DynamicImage, RgbaImage};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use rten_imageproc::RotatedRect;
use tracing::{debug, info, instrument};

use super::text::TextDetector;

/// Well-known filenames for the detection and recognition models.
const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Default directory for cached OCR model files.
///
/// Follows the XDG Base Directory specification: `$XDG_CACHE_HOME/ocrs`, falling
/// back to `~/.cache/ocrs` when `XDG_CACHE_HOME` is unset.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the OCR models.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `dir` to contain `text-detection.rten` and, optionally,
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// The detection model is mandatory.
    pub fn validate(&self) -> Result<()> {
        if !self.detection_model_path.exists() {
            return Err(ScanError::OcrError(format!(
                "detection model not found at {}; run the `ocrs` CLI once to download models",
                self.detection_model_path.display()
            )));
        }
        Ok(())
    }
}

fn load_model(path: &Path, kind: &str) -> Result<Model> {
    info!(path = %path.display(), "Loading OCR {kind} model");
    Model::load_file(path).map_err(|err| {
        ScanError::OcrError(format!(
            "failed to load {kind} model from {}: {}",
            path.display(),
            err
        ))
    })
}

/// [`TextDetector`] that reports one block per detected text line.
pub struct OcrsTextDetector {
    engine: OcrEngine,
}

impl OcrsTextDetector {
    /// Load the models named by `config`.
    ///
    /// Model loading is the expensive step; build one detector and share it.
    #[instrument(skip_all, fields(detection = %config.detection_model_path.display()))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        let detection_model = load_model(&config.detection_model_path, "detection")?;
        let recognition_model = if config.recognition_model_path.exists() {
            Some(load_model(&config.recognition_model_path, "recognition")?)
        } else {
            None
        };

        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model,
            ..Default::default()
        })
        .map_err(|err| ScanError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;

        info!("OCR text detector ready");
        Ok(Self { engine })
    }
}

impl TextDetector for OcrsTextDetector {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn detect_text_blocks(&self, image: &RgbaImage) -> Result<Vec<TextBlock>> {
        let rgb = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            ScanError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| ScanError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| ScanError::OcrError(format!("word detection failed: {}", err)))?;
        let lines = self.engine.find_text_lines(&input, &words);
        debug!(words = words.len(), lines = lines.len(), "Text lines located");

        Ok(lines.iter().filter_map(|line| line_block(line)).collect())
    }
}

/// Axis-aligned box around every word of one line. `None` for empty lines.
fn line_block(words: &[RotatedRect]) -> Option<TextBlock> {
    let mut rects = words.iter().map(|word| word.bounding_rect());
    let first = rects.next()?;
    let (mut left, mut top, mut right, mut bottom) =
        (first.left(), first.top(), first.right(), first.bottom());
    for rect in rects {
        left = left.min(rect.left());
        top = top.min(rect.top());
        right = right.max(rect.right());
        bottom = bottom.max(rect.bottom());
    }
    Some(TextBlock::new(
        left.floor() as i32,
        top.floor() as i32,
        right.ceil() as i32,
        bottom.ceil() as i32,
    ))
}
