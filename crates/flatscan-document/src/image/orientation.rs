// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation normalizer — reads the EXIF orientation tag from encoded bytes
// and bakes the rotation/flip into the pixel data.

use std::io::Cursor;

use flatscan_core::Orientation;
use image::DynamicImage;
use tracing::debug;

/// Read the stored orientation from raw encoded image bytes.
///
/// Any failure (no EXIF block, unsupported container, missing tag) yields
/// [`Orientation::Normal`]; metadata problems never fail the pipeline.
pub fn read_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(reader) => reader,
        Err(err) => {
            debug!(error = %err, "No readable EXIF metadata; assuming normal orientation");
            return Orientation::Normal;
        }
    };

    let value = reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1);
    Orientation::from_exif(value)
}

/// Rotate/flip `image` so that it displays upright.
pub fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => image,
        Orientation::FlipHorizontal => image.fliph(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::FlipVertical => image.flipv(),
        Orientation::Transpose => image.rotate90().fliph(),
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Transverse => image.rotate270().fliph(),
        Orientation::Rotate270 => image.rotate270(),
    }
}
