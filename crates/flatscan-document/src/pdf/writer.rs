// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — places a single scanned page image on a fixed-size page using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use flatscan_core::PageSize;
use flatscan_core::error::ScanError;
use image::{DynamicImage, RgbaImage};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::image::processor::ImageProcessor;

/// Points per inch; images are embedded at one pixel per point before scaling.
const POINTS_PER_INCH: f32 = 72.0;

/// Where an image lands on the page, in points.
///
/// `x`/`y` are the lower-left corner in PDF user space (origin bottom-left);
/// `top` is the same placement measured down from the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedRect {
    pub x: f32,
    pub y: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit an image of `image_w` x `image_h` pixels inside `page`, preserving the
/// aspect ratio and centring along the slack axis.
///
/// Images relatively wider than the page span the full width; all others
/// span the full height.
pub fn fit_rect(image_w: u32, image_h: u32, page: PageSize) -> PlacedRect {
    let image_ratio = image_w.max(1) as f32 / image_h.max(1) as f32;
    let page_ratio = page.width_pt / page.height_pt;

    let (width, height) = if image_ratio > page_ratio {
        (page.width_pt, page.width_pt / image_ratio)
    } else {
        (page.height_pt * image_ratio, page.height_pt)
    };

    let x = (page.width_pt - width) / 2.0;
    let top = (page.height_pt - height) / 2.0;
    PlacedRect {
        x,
        y: page.height_pt - top - height,
        top,
        width,
        height,
    }
}

/// Creates single-page PDF documents from scanned images.
pub struct PdfWriter {
    /// Page size in points.
    page_size: PageSize,
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfWriter {
    /// Create a new writer targeting the given page size.
    pub fn new(page_size: PageSize) -> Self {
        Self {
            page_size,
            title: None,
        }
    }

    /// Create a new writer on the default 595x842 pt page.
    pub fn a4() -> Self {
        Self::new(PageSize::A4_POINTS)
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Page dimensions in printpdf's Mm units.
    fn page_dimensions(&self) -> (Mm, Mm) {
        let to_mm = |pt: f32| Mm(pt * 25.4 / POINTS_PER_INCH);
        (to_mm(self.page_size.width_pt), to_mm(self.page_size.height_pt))
    }

    // -- Image to PDF ---------------------------------------------------------

    /// Create a single-page PDF from encoded image bytes.
    ///
    /// The bytes go through the same decode and orientation normalisation as
    /// the scan pipeline. Undecodable input is an [`ScanError::InvalidInput`].
    #[instrument(skip(self, image_bytes), fields(bytes_len = image_bytes.len()))]
    pub fn create_from_image(&self, image_bytes: &[u8]) -> Result<Vec<u8>, ScanError> {
        let processor = ImageProcessor::from_bytes(image_bytes)
            .map_err(|_| ScanError::InvalidInput("Invalid image data".into()))?;
        self.create_from_rgba(processor.as_rgba())
    }

    /// Create a single-page PDF containing `image`, fitted to the page.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn create_from_rgba(&self, image: &RgbaImage) -> Result<Vec<u8>, ScanError> {
        let (page_w, page_h) = self.page_dimensions();
        let title = self.title.as_deref().unwrap_or("Scanned Document");

        info!(page = ?self.page_size, title, "Creating image PDF");

        let (img_width, img_height) = image.dimensions();
        if img_width == 0 || img_height == 0 {
            return Err(ScanError::PdfError("cannot place an empty image".into()));
        }

        // Alpha is dropped; the page background is opaque anyway.
        let rgb_image = DynamicImage::ImageRgba8(image.clone()).into_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb_image.into_raw()),
            width: img_width as usize,
            height: img_height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };

        let mut doc = PdfDocument::new(title);
        let xobject_id = doc.add_image(&raw);

        let placed = fit_rect(img_width, img_height, self.page_size);
        let scale_x = placed.width / img_width as f32;
        let scale_y = placed.height / img_height as f32;

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placed.x)),
                translate_y: Some(Pt(placed.y)),
                scale_x: Some(scale_x),
                scale_y: Some(scale_y),
                dpi: Some(POINTS_PER_INCH),
                rotate: None,
            },
        }];

        let page = PdfPage::new(page_w, page_h, ops);
        doc.with_pages(vec![page]);

        debug!(
            x = placed.x,
            y = placed.y,
            width = placed.width,
            height = placed.height,
            "Image placed on page"
        );

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            debug!(warnings = warnings.len(), "printpdf reported warnings");
        }

        Ok(output)
    }
}
