// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode with orientation applied, crop, and encode.
// Operates on in-memory RGBA images using the `image` crate.

use flatscan_core::error::ScanError;
use image::imageops;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tracing::{debug, instrument};

use super::orientation::{apply_orientation, read_orientation};

/// A single in-memory RGBA image moving through the pipeline.
///
/// Transformations consume `self` and return a new `ImageProcessor`, so each
/// stage owns its output and never mutates a previous stage's buffer.
///
/// ```ignore
/// let jpeg = ImageProcessor::from_bytes(&photo)?
///     .crop(10, 10, 400, 600)
///     .to_jpeg_bytes(92)?;
/// ```
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    /// The current working image.
    image: RgbaImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, ...) and apply the stored EXIF
    /// orientation so the pixels are upright.
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, ScanError> {
        let decoded = image::load_from_memory(data).map_err(|err| {
            ScanError::ImageError(format!("failed to decode image: {}", err))
        })?;
        let orientation = read_orientation(data);
        let upright = apply_orientation(decoded, orientation);
        debug!(
            width = upright.width(),
            height = upright.height(),
            ?orientation,
            "Image decoded and normalised"
        );
        Ok(Self {
            image: upright.into_rgba8(),
        })
    }

    /// Wrap an already-decoded RGBA image.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    /// Current image width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Current image height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Borrow the underlying image.
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the processor and return the underlying image.
    pub fn into_rgba(self) -> RgbaImage {
        self.image
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Crop a rectangular region from the image.
    ///
    /// `x` and `y` are the top-left corner; `width` and `height` define the
    /// size of the crop rectangle. Values are clamped to image bounds.
    #[instrument(skip(self), fields(x, y, width, height))]
    pub fn crop(self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let img_w = self.image.width();
        let img_h = self.image.height();

        let safe_x = x.min(img_w.saturating_sub(1));
        let safe_y = y.min(img_h.saturating_sub(1));
        let safe_w = width.min(img_w - safe_x);
        let safe_h = height.min(img_h - safe_y);

        debug!(safe_x, safe_y, safe_w, safe_h, "Cropping image");

        let cropped = imageops::crop_imm(&self.image, safe_x, safe_y, safe_w, safe_h).to_image();
        Self { image: cropped }
    }

    // -- Output ---------------------------------------------------------------

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    ///
    /// JPEG has no alpha channel, so the image is flattened to RGB first.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>, ScanError> {
        let mut buffer = Vec::new();
        let rgb = DynamicImage::ImageRgba8(self.image.clone()).into_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
        rgb.write_with_encoder(encoder).map_err(|err| {
            ScanError::ImageError(format!("JPEG encoding failed: {}", err))
        })?;
        Ok(buffer)
    }

    /// Encode the current image as PNG bytes.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>, ScanError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        self.image
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|err| ScanError::ImageError(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32) -> ImageProcessor {
        ImageProcessor::from_rgba(RgbaImage::from_pixel(width, height, Rgba([90, 120, 150, 255])))
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        let result = ImageProcessor::from_bytes(b"definitely not an image");
        assert!(matches!(result, Err(ScanError::ImageError(_))));
    }

    #[test]
    fn png_round_trip_keeps_dimensions() {
        let bytes = solid(31, 17).to_png_bytes().unwrap();
        let decoded = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (31, 17));
    }

    #[test]
    fn jpeg_output_decodes() {
        let bytes = solid(64, 48).to_jpeg_bytes(92).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        let decoded = ImageProcessor::from_bytes(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn crop_clamps_to_bounds() {
        let cropped = solid(100, 80).crop(90, 70, 50, 50);
        assert_eq!((cropped.width(), cropped.height()), (10, 10));
    }
}
