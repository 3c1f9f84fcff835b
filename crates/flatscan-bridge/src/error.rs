// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Channel errors — what the host sees when a call fails.

use flatscan_core::{ErrorCategory, ScanError};
use thiserror::Error;

use crate::request::Method;

/// Missing or mistyped call arguments.
pub const INVALID_ARGS: &str = "invalid_args";
/// Method name the bridge does not know.
pub const NOT_IMPLEMENTED: &str = "not_implemented";
/// Failure while processing a document.
pub const NATIVE_PROCESSING_ERROR: &str = "native_processing_error";
/// Failure while building a PDF.
pub const NATIVE_PDF_ERROR: &str = "native_pdf_error";

/// An error reply: a stable code plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ChannelError {
    pub code: &'static str,
    pub message: String,
}

impl ChannelError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new(INVALID_ARGS, message)
    }

    /// Map a pipeline error raised while serving `method`.
    ///
    /// Anything other than "not implemented" is reported under the method's
    /// own failure code; invalid input keeps its bare message.
    pub fn from_scan_error(method: Method, err: ScanError) -> Self {
        match (err.category(), err) {
            (ErrorCategory::NotImplemented, err) => Self::new(NOT_IMPLEMENTED, err.to_string()),
            (_, ScanError::InvalidInput(message)) => Self::new(method.failure_code(), message),
            (_, err) => Self::new(method.failure_code(), err.to_string()),
        }
    }
}
