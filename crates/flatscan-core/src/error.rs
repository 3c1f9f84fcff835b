// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for flatscan.

use thiserror::Error;

/// Top-level error type for all flatscan operations.
///
/// Detection misses (no quad, no text, no crop) are never represented here;
/// the pipeline resolves them through its fallback chain.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Caller errors --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("method not implemented: {0}")]
    NotImplemented(String),

    // -- Processing errors --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("document processing failed: {0}")]
    ProcessingFailed(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("processing was interrupted before completion")]
    Cancelled,

    // -- Configuration / persistence --
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification used at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing or malformed arguments, undecodable bytes.
    InvalidInput,
    /// The host asked for a method that does not exist.
    NotImplemented,
    /// Anything else: a failure inside the pipeline itself.
    ProcessingFailed,
}

impl ScanError {
    /// Classify this error for the request boundary.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidInput(_) => ErrorCategory::InvalidInput,
            Self::NotImplemented(_) => ErrorCategory::NotImplemented,
            _ => ErrorCategory::ProcessingFailed,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;
