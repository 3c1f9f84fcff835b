// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — warps a detected quadrilateral onto an upright
// rectangle sized from the quadrilateral's own edges.

use flatscan_core::{CornerPoints, Point};
use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::Projection;
use tracing::{debug, instrument, warn};

/// Output size for a quad: the longer of each pair of opposite edges,
/// rounded, never below 1 px.
pub fn target_dimensions(corners: &CornerPoints) -> (u32, u32) {
    let width = corners
        .bottom_right
        .distance(&corners.bottom_left)
        .max(corners.top_right.distance(&corners.top_left));
    let height = corners
        .top_right
        .distance(&corners.bottom_right)
        .max(corners.top_left.distance(&corners.bottom_left));
    (
        (width.round() as u32).max(1),
        (height.round() as u32).max(1),
    )
}

/// Warp the region bounded by `corners` onto a `target_dimensions` rectangle.
///
/// Each output pixel is mapped back into the source through the inverse
/// homography and sampled bilinearly; samples beyond the border reuse the
/// nearest edge pixel. Returns `None` only when the corners are degenerate
/// (zero area, or no projective transform exists).
#[instrument(skip_all, fields(src_w = image.width(), src_h = image.height()))]
pub fn warp_to_rectangle(image: &RgbaImage, corners: &CornerPoints) -> Option<RgbaImage> {
    if corners.area() <= f32::EPSILON {
        warn!("Zero-area quadrilateral; nothing to rectify");
        return None;
    }
    let (out_w, out_h) = target_dimensions(corners);

    let dest = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];
    let src = corners.to_array().map(|Point { x, y }| (x, y));

    // Destination -> source, so every output pixel pulls from the photo.
    let Some(projection) = Projection::from_control_points(dest, src) else {
        warn!("Degenerate quadrilateral; no projective transform");
        return None;
    };

    let output = RgbaImage::from_fn(out_w, out_h, |x, y| {
        let (sx, sy) = projection * (x as f32, y as f32);
        sample_bilinear_replicate(image, sx, sy)
    });

    debug!(out_w, out_h, "Perspective warp complete");
    Some(output)
}

/// Bilinear sample at a fractional position, clamping out-of-range taps to
/// the nearest edge pixel.
fn sample_bilinear_replicate(image: &RgbaImage, x: f32, y: f32) -> Rgba<u8> {
    let (width, height) = image.dimensions();
    if !x.is_finite() || !y.is_finite() {
        return *image.get_pixel(0, 0);
    }

    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let clamp_x = |v: i64| v.clamp(0, max_x) as u32;
    let clamp_y = |v: i64| v.clamp(0, max_y) as u32;
    let (xa, xb) = (clamp_x(x0 as i64), clamp_x(x0 as i64 + 1));
    let (ya, yb) = (clamp_y(y0 as i64), clamp_y(y0 as i64 + 1));

    let tl = image.get_pixel(xa, ya).0;
    let tr = image.get_pixel(xb, ya).0;
    let bl = image.get_pixel(xa, yb).0;
    let br = image.get_pixel(xb, yb).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = tl[c] as f32 * (1.0 - fx) + tr[c] as f32 * fx;
        let bottom = bl[c] as f32 * (1.0 - fx) + br[c] as f32 * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [(f32, f32); 4]) -> CornerPoints {
        CornerPoints::from_unordered(points.map(|(x, y)| Point::new(x, y)))
    }

    #[test]
    fn dimensions_use_longer_opposite_edges() {
        // Trapezoid: top edge 100, bottom edge 140, sides ~200.
        let corners = quad([(20.0, 0.0), (120.0, 0.0), (140.0, 200.0), (0.0, 200.0)]);
        let (w, h) = target_dimensions(&corners);
        assert_eq!(w, 140);
        assert_eq!(h, (20.0f32.hypot(200.0)).round() as u32);
    }

    #[test]
    fn dimensions_never_zero() {
        let corners = quad([(5.0, 5.0), (5.2, 5.0), (5.2, 5.2), (5.0, 5.2)]);
        assert_eq!(target_dimensions(&corners), (1, 1));
    }

    #[test]
    fn axis_aligned_quad_is_a_crop() {
        let image = RgbaImage::from_fn(100, 80, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let corners = quad([(10.0, 20.0), (60.0, 20.0), (60.0, 70.0), (10.0, 70.0)]);

        let out = warp_to_rectangle(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 0, 255]);
        assert_eq!(out.get_pixel(25, 30).0, [35, 50, 0, 255]);
    }

    #[test]
    fn full_frame_quad_replicates_edges() {
        let image = RgbaImage::from_fn(40, 30, |x, _| Rgba([(x * 5) as u8, 0, 0, 255]));
        let corners = quad([(0.0, 0.0), (40.0, 0.0), (40.0, 30.0), (0.0, 30.0)]);

        let out = warp_to_rectangle(&image, &corners).unwrap();
        assert_eq!(out.dimensions(), (40, 30));
        // Rightmost column samples between x=39 and the replicated x=39.
        assert_eq!(out.get_pixel(39, 10).0[0], 195);
    }

    #[test]
    fn degenerate_quad_has_no_transform() {
        let image = RgbaImage::new(10, 10);
        let corners = CornerPoints {
            top_left: Point::new(1.0, 1.0),
            top_right: Point::new(1.0, 1.0),
            bottom_right: Point::new(1.0, 1.0),
            bottom_left: Point::new(1.0, 1.0),
        };
        assert!(warp_to_rectangle(&image, &corners).is_none());
    }

    #[test]
    fn sampler_clamps_far_outside() {
        let image = RgbaImage::from_fn(4, 4, |x, y| Rgba([(x * 10 + y) as u8, 0, 0, 255]));
        assert_eq!(sample_bilinear_replicate(&image, -50.0, -50.0).0[0], 0);
        assert_eq!(sample_bilinear_replicate(&image, 99.0, 99.0).0[0], 33);
        assert_eq!(sample_bilinear_replicate(&image, 1.5, 0.0).0[0], 15);
    }
}
