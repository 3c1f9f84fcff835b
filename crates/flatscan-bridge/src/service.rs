// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan service — runs validated requests against a shared pipeline, either
// inline or on tokio's blocking pool.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use flatscan_core::ScanError;
use flatscan_document::ScanPipeline;
use tracing::{Instrument, Span, info, info_span, warn};

use crate::error::ChannelError;
use crate::request::{MethodCall, RequestId, ScanRequest};

/// Serves host method calls.
///
/// Cheap to clone; clones share one pipeline. The pipeline is stateless per
/// call, so concurrent requests never observe each other.
#[derive(Clone)]
pub struct ScanService {
    pipeline: Arc<ScanPipeline>,
}

impl Default for ScanService {
    fn default() -> Self {
        Self::new(ScanPipeline::default())
    }
}

impl ScanService {
    pub fn new(pipeline: ScanPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn pipeline(&self) -> &ScanPipeline {
        &self.pipeline
    }

    fn request_span(id: RequestId, call: &MethodCall) -> Span {
        info_span!("request", id = %id, method = %call.method)
    }

    /// Handle a call on the current thread.
    ///
    /// A panic inside the pipeline is caught and reported with the method's
    /// failure code, as [`handle`](Self::handle) does for its worker.
    pub fn handle_blocking(&self, call: MethodCall) -> Result<Vec<u8>, ChannelError> {
        let span = Self::request_span(RequestId::new(), &call);
        let _guard = span.enter();
        let request = ScanRequest::from_call(call)?;
        let method = request.method();

        // The pipeline holds no per-call state, so nothing is left half-updated.
        panic::catch_unwind(AssertUnwindSafe(|| execute(&self.pipeline, request))).unwrap_or_else(
            |payload| {
                let reason = panic_message(payload.as_ref());
                warn!(%reason, "Pipeline panicked");
                Err(ChannelError::from_scan_error(
                    method,
                    ScanError::ProcessingFailed(format!("pipeline panicked: {reason}")),
                ))
            },
        )
    }

    /// Handle a call on tokio's blocking pool.
    ///
    /// Argument errors are reported without spawning. If the worker panics
    /// or is aborted the caller gets the method's failure code, never a
    /// partial result.
    pub async fn handle(&self, call: MethodCall) -> Result<Vec<u8>, ChannelError> {
        let span = Self::request_span(RequestId::new(), &call);
        let request = {
            let _guard = span.enter();
            ScanRequest::from_call(call)?
        };
        let method = request.method();
        let pipeline = Arc::clone(&self.pipeline);

        let worker_span = span.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let _guard = worker_span.enter();
            execute(&pipeline, request)
        })
        .instrument(span.clone())
        .await;

        match joined {
            Ok(result) => result,
            Err(join_err) => {
                let _guard = span.enter();
                warn!(error = %join_err, "Worker did not complete");
                let err = if join_err.is_cancelled() {
                    ScanError::Cancelled
                } else {
                    ScanError::ProcessingFailed(format!("worker panicked: {join_err}"))
                };
                Err(ChannelError::from_scan_error(method, err))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn execute(pipeline: &ScanPipeline, request: ScanRequest) -> Result<Vec<u8>, ChannelError> {
    let method = request.method();
    let result = match request {
        ScanRequest::ProcessDocument { bytes } => Ok(pipeline.process_document(&bytes)),
        ScanRequest::CreatePdf { bytes, title } => pipeline.create_pdf(&bytes, &title),
    };
    match result {
        Ok(output) => {
            info!(output_len = output.len(), "Request complete");
            Ok(output)
        }
        Err(err) => {
            warn!(error = %err, "Request failed");
            Err(ChannelError::from_scan_error(method, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{INVALID_ARGS, NATIVE_PDF_ERROR, NATIVE_PROCESSING_ERROR, NOT_IMPLEMENTED};
    use crate::request::{ArgValue, MethodArgs};
    use flatscan_core::{CornerPoints, TextBoundsRect};
    use flatscan_document::ImageProcessor;
    use flatscan_document::scan::DocumentGeometry;
    use image::{Rgba, RgbaImage};

    fn png(width: u32, height: u32) -> Vec<u8> {
        ImageProcessor::from_rgba(RgbaImage::from_pixel(width, height, Rgba([160, 160, 160, 255])))
            .to_png_bytes()
            .unwrap()
    }

    fn pdf_call(bytes: Vec<u8>, title: &str) -> MethodCall {
        MethodCall::new(
            "createPdfFromImage",
            MethodArgs::map([
                ("bytes", ArgValue::Bytes(bytes)),
                ("title", ArgValue::Text(title.into())),
            ]),
        )
    }

    struct PanickingGeometry;

    impl DocumentGeometry for PanickingGeometry {
        fn find_document_quad(
            &self,
            _image: &RgbaImage,
            _text_bounds: Option<&TextBoundsRect>,
        ) -> Option<CornerPoints> {
            panic!("geometry backend crashed");
        }

        fn warp_quad_to_rectangle(&self, _image: &RgbaImage, _corners: &CornerPoints) -> Option<RgbaImage> {
            None
        }
    }

    #[tokio::test]
    async fn process_document_returns_jpeg() {
        let service = ScanService::default();
        let out = service
            .handle(MethodCall::new("processDocument", MethodArgs::Bytes(png(60, 40))))
            .await
            .unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn undecodable_document_echoes_input() {
        let garbage = b"garbage in".to_vec();
        let out = ScanService::default()
            .handle(MethodCall::new("processDocument", MethodArgs::Bytes(garbage.clone())))
            .await
            .unwrap();
        assert_eq!(out, garbage);
    }

    #[tokio::test]
    async fn argument_errors_are_reported() {
        let service = ScanService::default();

        let err = service
            .handle(MethodCall::new("processDocument", MethodArgs::Empty))
            .await
            .unwrap_err();
        assert_eq!((err.code, err.message.as_str()), (INVALID_ARGS, "Expected raw image bytes"));

        let err = service
            .handle(MethodCall::new("createPdfFromImage", MethodArgs::Bytes(png(4, 4))))
            .await
            .unwrap_err();
        assert_eq!((err.code, err.message.as_str()), (INVALID_ARGS, "Expected bytes and title"));

        let err = service
            .handle(MethodCall::new("scanEverything", MethodArgs::Empty))
            .await
            .unwrap_err();
        assert_eq!(err.code, NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn pdf_request_produces_pdf() {
        let out = ScanService::default().handle(pdf_call(png(30, 30), "Scan")).await.unwrap();
        assert!(out.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn pdf_with_bad_image_uses_pdf_code() {
        let err = ScanService::default()
            .handle(pdf_call(b"junk".to_vec(), "Scan"))
            .await
            .unwrap_err();
        assert_eq!(err.code, NATIVE_PDF_ERROR);
        assert_eq!(err.message, "Invalid image data");
    }

    #[tokio::test]
    async fn worker_panic_is_an_error_not_a_result() {
        let service = ScanService::new(ScanPipeline::default().with_geometry(PanickingGeometry));
        let err = service
            .handle(MethodCall::new("processDocument", MethodArgs::Bytes(png(20, 20))))
            .await
            .unwrap_err();
        assert_eq!(err.code, NATIVE_PROCESSING_ERROR);
    }

    #[test]
    fn blocking_panic_is_an_error_not_a_result() {
        let service = ScanService::new(ScanPipeline::default().with_geometry(PanickingGeometry));
        let err = service
            .handle_blocking(MethodCall::new("processDocument", MethodArgs::Bytes(png(20, 20))))
            .unwrap_err();
        assert_eq!(err.code, NATIVE_PROCESSING_ERROR);
        assert!(err.message.contains("geometry backend crashed"), "{}", err.message);

        // The service keeps working after a caught panic.
        let pdf = service.handle_blocking(pdf_call(png(10, 10), "After")).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn concurrent_requests_are_independent() {
        let service = ScanService::default();
        let (a, b) = tokio::join!(
            service.handle(MethodCall::new("processDocument", MethodArgs::Bytes(png(40, 20)))),
            service.handle(pdf_call(png(20, 40), "Second")),
        );
        assert_eq!(&a.unwrap()[..2], &[0xFF, 0xD8]);
        assert!(b.unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn blocking_entry_point() {
        let service = ScanService::default();
        let out = service
            .handle_blocking(MethodCall::new("processDocument", MethodArgs::Bytes(png(16, 16))))
            .unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));
    }
}
