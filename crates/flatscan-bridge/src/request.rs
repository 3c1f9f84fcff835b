// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Incoming method calls and their validated form.

use std::collections::BTreeMap;

use flatscan_core::ScanError;
use uuid::Uuid;

use crate::error::{ChannelError, NATIVE_PDF_ERROR, NATIVE_PROCESSING_ERROR};

/// Unique identifier for one host request, recorded on its tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single value inside a map argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Bytes(Vec<u8>),
    Text(String),
}

/// Untyped arguments as delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MethodArgs {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Map(BTreeMap<String, ArgValue>),
}

impl MethodArgs {
    /// Build a map argument from `(key, value)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, ArgValue)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn into_map(self) -> Option<BTreeMap<String, ArgValue>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// A raw call: method name plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: String,
    pub args: MethodArgs,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: MethodArgs) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// The methods the bridge serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    ProcessDocument,
    CreatePdfFromImage,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Self::ProcessDocument => "processDocument",
            Self::CreatePdfFromImage => "createPdfFromImage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "processDocument" => Some(Self::ProcessDocument),
            "createPdfFromImage" => Some(Self::CreatePdfFromImage),
            _ => None,
        }
    }

    /// Channel code used when this method fails after validation.
    pub fn failure_code(self) -> &'static str {
        match self {
            Self::ProcessDocument => NATIVE_PROCESSING_ERROR,
            Self::CreatePdfFromImage => NATIVE_PDF_ERROR,
        }
    }
}

/// A validated request, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanRequest {
    ProcessDocument { bytes: Vec<u8> },
    CreatePdf { bytes: Vec<u8>, title: String },
}

impl ScanRequest {
    pub fn method(&self) -> Method {
        match self {
            Self::ProcessDocument { .. } => Method::ProcessDocument,
            Self::CreatePdf { .. } => Method::CreatePdfFromImage,
        }
    }

    /// Validate a raw call.
    ///
    /// `processDocument` takes the image bytes directly; `createPdfFromImage`
    /// takes a map with `bytes` and `title`.
    pub fn from_call(call: MethodCall) -> Result<Self, ChannelError> {
        let Some(method) = Method::from_name(&call.method) else {
            return Err(ChannelError::from_scan_error(
                Method::ProcessDocument,
                ScanError::NotImplemented(call.method),
            ));
        };

        match method {
            Method::ProcessDocument => call
                .args
                .into_bytes()
                .map(|bytes| Self::ProcessDocument { bytes })
                .ok_or_else(|| ChannelError::invalid_args("Expected raw image bytes")),
            Method::CreatePdfFromImage => {
                let mut map = call.args.into_map().unwrap_or_default();
                match (map.remove("bytes"), map.remove("title")) {
                    (Some(ArgValue::Bytes(bytes)), Some(ArgValue::Text(title))) => {
                        Ok(Self::CreatePdf { bytes, title })
                    }
                    _ => Err(ChannelError::invalid_args("Expected bytes and title")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{INVALID_ARGS, NOT_IMPLEMENTED};

    #[test]
    fn process_document_takes_raw_bytes() {
        let call = MethodCall::new("processDocument", MethodArgs::Bytes(vec![1, 2, 3]));
        assert_eq!(
            ScanRequest::from_call(call).unwrap(),
            ScanRequest::ProcessDocument { bytes: vec![1, 2, 3] }
        );
    }

    #[test]
    fn process_document_without_bytes_is_invalid() {
        for args in [MethodArgs::Empty, MethodArgs::map([("bytes", ArgValue::Bytes(vec![1]))])] {
            let err = ScanRequest::from_call(MethodCall::new("processDocument", args)).unwrap_err();
            assert_eq!(err.code, INVALID_ARGS);
            assert_eq!(err.message, "Expected raw image bytes");
        }
    }

    #[test]
    fn create_pdf_needs_bytes_and_title() {
        let good = MethodArgs::map([
            ("bytes", ArgValue::Bytes(vec![9])),
            ("title", ArgValue::Text("Invoice".into())),
        ]);
        assert_eq!(
            ScanRequest::from_call(MethodCall::new("createPdfFromImage", good)).unwrap(),
            ScanRequest::CreatePdf { bytes: vec![9], title: "Invoice".into() }
        );

        let missing_title = MethodArgs::map([("bytes", ArgValue::Bytes(vec![9]))]);
        let wrong_type = MethodArgs::map([
            ("bytes", ArgValue::Text("not bytes".into())),
            ("title", ArgValue::Text("Invoice".into())),
        ]);
        for args in [missing_title, wrong_type, MethodArgs::Bytes(vec![9])] {
            let err = ScanRequest::from_call(MethodCall::new("createPdfFromImage", args)).unwrap_err();
            assert_eq!(err, ChannelError::invalid_args("Expected bytes and title"));
        }
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let err = ScanRequest::from_call(MethodCall::new("rotatePage", MethodArgs::Empty)).unwrap_err();
        assert_eq!(err.code, NOT_IMPLEMENTED);
        assert!(err.message.contains("rotatePage"));
    }

    #[test]
    fn method_names_round_trip() {
        for method in [Method::ProcessDocument, Method::CreatePdfFromImage] {
            assert_eq!(Method::from_name(method.name()), Some(method));
        }
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }
}
