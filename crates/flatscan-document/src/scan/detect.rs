// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document boundary detection — downscale, edge map, contour search, and a
// rotated-rectangle fallback, biased towards the region that holds text.

use std::borrow::Cow;

use flatscan_core::{CornerPoints, Point, ScanConfig, TextBoundsRect};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, RgbaImage};
use imageproc::contours::{Contour, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{arc_length, contour_area, min_area_rect};
use imageproc::morphology::close;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, info, instrument, warn};

/// A traced contour in working-image pixels.
type Outline = Vec<PixelPoint<i32>>;

/// A vertex in working-image coordinates.
type Vertex = (f64, f64);

// -- Downscaling --------------------------------------------------------------

/// Bounded-resolution working copy used for the geometry search.
///
/// Carries the per-axis factors that map working coordinates back to the
/// source image. Borrowed when the source is already small enough.
pub struct DetectionContext<'a> {
    image: Cow<'a, RgbaImage>,
    scale_x: f32,
    scale_y: f32,
}

impl<'a> DetectionContext<'a> {
    /// Shrink `image` so that its longest side is at most `max_dimension`.
    ///
    /// Each resized side is rounded to the nearest integer and never drops
    /// below 1 px; the scale factors are `original / resized` per axis.
    pub fn prepare(image: &'a RgbaImage, max_dimension: u32) -> Self {
        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if longest <= max_dimension {
            return Self {
                image: Cow::Borrowed(image),
                scale_x: 1.0,
                scale_y: 1.0,
            };
        }

        let scale = max_dimension as f32 / longest as f32;
        let new_w = ((width as f32 * scale).round() as u32).max(1);
        let new_h = ((height as f32 * scale).round() as u32).max(1);
        debug!(width, height, new_w, new_h, "Downscaling for detection");

        Self {
            image: Cow::Owned(imageops::resize(image, new_w, new_h, FilterType::Triangle)),
            scale_x: width as f32 / new_w as f32,
            scale_y: height as f32 / new_h as f32,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn scale(&self) -> (f32, f32) {
        (self.scale_x, self.scale_y)
    }

    /// Map a source-image point into working coordinates.
    pub fn to_working(&self, point: Point) -> Point {
        Point::new(point.x / self.scale_x, point.y / self.scale_y)
    }

    /// Map a working-image point back to source coordinates.
    pub fn to_source(&self, point: Point) -> Point {
        Point::new(point.x * self.scale_x, point.y * self.scale_y)
    }
}

// -- Detector -----------------------------------------------------------------

/// Finds the quadrilateral outline of a document in a photo.
///
/// ## Pipeline
///
/// 1. Downscale to the configured working size
/// 2. Grayscale, Gaussian blur, Canny edges, 5x5 morphological close
/// 3. Contours of the edge map; keep convex 4-gons that are large enough,
///    not too thin, and contain the text centre when one is known
/// 4. Same search on an inverted adaptive-threshold image
/// 5. Minimum-area rotated rectangle around the largest remaining contour
/// 6. Scale back to source resolution and assign corner roles
#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    max_dimension: u32,
    blur_sigma: f32,
    canny_low: f32,
    canny_high: f32,
    close_radius: u8,
    approx_epsilon: f64,
    min_quad_area: f64,
    min_aspect_ratio: f64,
    fallback_min_area: f64,
    block_radius: u32,
    threshold_constant: i32,
}

impl BoundaryDetector {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            max_dimension: config.detection_max_dimension,
            blur_sigma: config.blur_sigma,
            canny_low: config.canny_low,
            canny_high: config.canny_high,
            close_radius: config.close_radius,
            approx_epsilon: config.approx_epsilon,
            min_quad_area: config.min_quad_area,
            min_aspect_ratio: config.min_aspect_ratio,
            fallback_min_area: config.fallback_min_area,
            block_radius: config.threshold_block_size / 2,
            threshold_constant: config.threshold_constant,
        }
    }

    /// Locate the document boundary in `image`.
    ///
    /// `text_bounds` is in source coordinates. Returns `None` when nothing
    /// acceptable is found; that is an expected outcome, not a failure.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(
        &self,
        image: &RgbaImage,
        text_bounds: Option<&TextBoundsRect>,
    ) -> Option<CornerPoints> {
        let context = DetectionContext::prepare(image, self.max_dimension);
        let working = context.image();
        let image_area = working.width() as f64 * working.height() as f64;
        let text_center = text_bounds.map(|rect| {
            let center = context.to_working(rect.center());
            (center.x as f64, center.y as f64)
        });

        let gray = DynamicImage::ImageRgba8(working.clone()).into_luma8();
        let edges = self.edge_map(&gray);
        let edge_contours = contour_polygons(&edges);
        debug!(contours = edge_contours.len(), "Edge contours extracted");

        let mut quad = self.best_quad(&edge_contours, image_area, text_center);

        let mut threshold_contours = Vec::new();
        if quad.is_none() {
            debug!("No quad in edge map; retrying on adaptive threshold");
            let binary = inverted_adaptive_threshold(&gray, self.block_radius, self.threshold_constant);
            threshold_contours = contour_polygons(&binary);
            quad = self.best_quad(&threshold_contours, image_area, text_center);
        }

        if quad.is_none() {
            debug!("No quad found; falling back to rotated bounding rectangle");
            quad = self.best_rotated_rect(
                edge_contours.iter().chain(threshold_contours.iter()),
                image_area,
                text_center,
            );
        }

        let Some(quad) = quad else {
            warn!("No document boundary detected");
            return None;
        };

        let scaled = quad.map(|p| context.to_source(Point::new(p.x as f32, p.y as f32)));
        let corners = CornerPoints::from_unordered(scaled);
        info!(
            top_left = ?corners.top_left,
            top_right = ?corners.top_right,
            bottom_right = ?corners.bottom_right,
            bottom_left = ?corners.bottom_left,
            "Document boundary detected"
        );
        Some(corners)
    }

    /// Blur, Canny, then close small gaps in the edge map.
    fn edge_map(&self, gray: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(gray, self.blur_sigma);
        let edges = canny(&blurred, self.canny_low, self.canny_high);
        close(&edges, Norm::LInf, self.close_radius)
    }

    /// Largest convex 4-gon approximation among `contours` that passes the
    /// area, aspect and text-containment filters. Ties keep the first.
    fn best_quad(
        &self,
        contours: &[Outline],
        image_area: f64,
        text_center: Option<Vertex>,
    ) -> Option<[PixelPoint<i32>; 4]> {
        let min_area = image_area * self.min_quad_area;
        let mut best: Option<(f64, [PixelPoint<i32>; 4])> = None;

        for contour in contours {
            let epsilon = self.approx_epsilon * arc_length(contour, true);
            let approx = approximate_closed_polygon(contour, epsilon);
            let Ok(quad) = <[PixelPoint<i32>; 4]>::try_from(approx) else {
                continue;
            };

            let area = contour_area(&quad);
            if area < min_area {
                continue;
            }
            if bounding_ratio(&quad) < self.min_aspect_ratio || !is_convex(&quad) {
                continue;
            }
            if let Some(center) = text_center {
                if !polygon_contains(&quad, center) {
                    continue;
                }
            }
            if best.is_none_or(|(best_area, _)| area > best_area) {
                best = Some((area, quad));
            }
        }

        if let Some((area, _)) = best {
            debug!(area, min_area, "Quad candidate selected");
        }
        best.map(|(_, quad)| quad)
    }

    /// Minimum-area rotated rectangle around the largest contour whose area
    /// clears the fallback floor and whose rectangle holds the text centre.
    fn best_rotated_rect<'c>(
        &self,
        contours: impl Iterator<Item = &'c Outline>,
        image_area: f64,
        text_center: Option<Vertex>,
    ) -> Option<[PixelPoint<i32>; 4]> {
        let min_area = image_area * self.fallback_min_area;
        let mut best: Option<(f64, [PixelPoint<i32>; 4])> = None;

        for contour in contours {
            if contour.len() < 3 {
                continue;
            }
            let area = contour_area(contour);
            if area < min_area || best.is_some_and(|(best_area, _)| area <= best_area) {
                continue;
            }
            // Collinear contours collapse to a zero-area rectangle.
            let rect = min_area_rect(contour);
            if contour_area(&rect) <= 0.0 {
                continue;
            }
            if let Some(center) = text_center {
                if !polygon_contains(&rect, center) {
                    continue;
                }
            }
            best = Some((area, rect));
        }

        best.map(|(_, rect)| rect)
    }
}

/// Extract every border (outer and hole) of a binary image.
fn contour_polygons(binary: &GrayImage) -> Vec<Outline> {
    find_contours::<i32>(binary)
        .into_iter()
        .map(|contour: Contour<i32>| contour.points)
        .collect()
}

// -- Adaptive threshold -------------------------------------------------------

/// Local-mean threshold with inverted polarity: pixels at or below
/// `mean - c` become 255, everything else 0.
fn inverted_adaptive_threshold(gray: &GrayImage, block_radius: u32, c: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let integral = compute_integral_image(gray);

    GrayImage::from_fn(width, height, |x, y| {
        let local_mean = region_mean(&integral, width, height, x, y, block_radius);
        let threshold = local_mean - c as f64;
        let value = gray.get_pixel(x, y).0[0] as f64;
        if value > threshold { Luma([0u8]) } else { Luma([255u8]) }
    })
}

/// Compute the integral (summed-area table) of a grayscale image.
///
/// `integral[y * (width+1) + x]` contains the sum of all pixel values in the
/// rectangle [0, 0) to (x, y) (exclusive on both axes). The table has
/// dimensions `(width+1) x (height+1)` with a zero-padded border.
fn compute_integral_image(gray: &GrayImage) -> Vec<u64> {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;
    let mut table = vec![0u64; stride * (h + 1) as usize];

    for y in 0..h {
        let mut row_sum: u64 = 0;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y).0[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean pixel value within a square region centred on (cx, cy), clamped to
/// the image, using the precomputed integral image.
fn region_mean(
    integral: &[u64],
    img_width: u32,
    img_height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f64 {
    let stride = (img_width + 1) as usize;

    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(img_width as usize);
    let y2 = ((cy + radius + 1) as usize).min(img_height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f64;
    if area == 0.0 {
        return 128.0;
    }

    // S = I[y2][x2] - I[y1][x2] - I[y2][x1] + I[y1][x1]
    let sum = integral[y2 * stride + x2] as f64
        - integral[y1 * stride + x2] as f64
        - integral[y2 * stride + x1] as f64
        + integral[y1 * stride + x1] as f64;

    sum / area
}

// -- Polygon geometry ---------------------------------------------------------
//
// Area, perimeter and the rotated bounding rectangle come from
// `imageproc::geometry`. What remains here works on float vertices.

fn vertex(p: PixelPoint<i32>) -> Vertex {
    (p.x as f64, p.y as f64)
}

/// Short side over long side of the integer bounding box.
fn bounding_ratio(points: &[PixelPoint<i32>]) -> f64 {
    let (mut min_x, mut min_y) = (i32::MAX, i32::MAX);
    let (mut max_x, mut max_y) = (i32::MIN, i32::MIN);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    let width = (max_x - min_x + 1) as f64;
    let height = (max_y - min_y + 1) as f64;
    width.min(height) / width.max(height)
}

fn cross(o: Vertex, a: Vertex, b: Vertex) -> f64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Strictly convex: every turn has the same, non-zero orientation.
fn is_convex(points: &[PixelPoint<i32>]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let turn = cross(
            vertex(points[i]),
            vertex(points[(i + 1) % n]),
            vertex(points[(i + 2) % n]),
        );
        if turn == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = turn.signum();
        } else if turn.signum() != sign {
            return false;
        }
    }
    true
}

/// Point-in-polygon test; points on the boundary count as inside.
fn polygon_contains(polygon: &[PixelPoint<i32>], point: Vertex) -> bool {
    let n = polygon.len();
    let mut inside = false;
    for i in 0..n {
        let a = vertex(polygon[i]);
        let b = vertex(polygon[(i + 1) % n]);

        let on_line = cross(a, b, point).abs() < 1e-9;
        let within = point.0 >= a.0.min(b.0)
            && point.0 <= a.0.max(b.0)
            && point.1 >= a.1.min(b.1)
            && point.1 <= a.1.max(b.1);
        if on_line && within {
            return true;
        }

        if (a.1 > point.1) != (b.1 > point.1) {
            let x_at = a.0 + (point.1 - a.1) * (b.0 - a.0) / (b.1 - a.1);
            if point.0 < x_at {
                inside = !inside;
            }
        }
    }
    inside
}

/// Distance from `p` to the line through `a` and `b`.
fn perpendicular_distance(p: Vertex, a: Vertex, b: Vertex) -> f64 {
    let length = (b.0 - a.0).hypot(b.1 - a.1);
    if length == 0.0 {
        return (p.0 - a.0).hypot(p.1 - a.1);
    }
    cross(a, b, p).abs() / length
}

/// Douglas-Peucker simplification of an open chain; both ends are kept.
fn simplify_chain(chain: &[PixelPoint<i32>], epsilon: f64, out: &mut Vec<PixelPoint<i32>>) {
    let mut keep = vec![false; chain.len()];
    keep[0] = true;
    keep[chain.len() - 1] = true;

    let mut stack = vec![(0usize, chain.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (vertex(chain[start]), vertex(chain[end]));
        let (mut index, mut dmax) = (start, 0.0);
        for (i, &p) in chain.iter().enumerate().take(end).skip(start + 1) {
            let d = perpendicular_distance(vertex(p), a, b);
            if d > dmax {
                index = i;
                dmax = d;
            }
        }
        if dmax > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    out.extend(
        chain
            .iter()
            .zip(keep)
            .filter_map(|(&p, kept)| kept.then_some(p)),
    );
}

/// Douglas-Peucker for a closed contour.
///
/// `imageproc::geometry::approximate_polygon_dp` anchors on the first
/// point, so its output shifts with the tracer's start. Here the contour is
/// split at two mutually distant points instead.
fn approximate_closed_polygon(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let farthest_from = |origin: PixelPoint<i32>| {
        let origin = vertex(origin);
        let mut index = 0;
        let mut dmax = -1.0;
        for (i, &p) in points.iter().enumerate() {
            let p = vertex(p);
            let d = (p.0 - origin.0).hypot(p.1 - origin.1);
            if d > dmax {
                index = i;
                dmax = d;
            }
        }
        index
    };
    let a = farthest_from(points[0]);
    let b = farthest_from(points[a]);
    if a == b {
        return vec![points[a]];
    }
    let (first, second) = (a.min(b), a.max(b));

    // Chain first..=second, then second..=first wrapping around the end.
    let forward = &points[first..=second];
    let backward: Vec<PixelPoint<i32>> = points[second..]
        .iter()
        .chain(points[..=first].iter())
        .copied()
        .collect();

    let mut result = Vec::new();
    simplify_chain(forward, epsilon, &mut result);
    result.pop();
    simplify_chain(&backward, epsilon, &mut result);
    result.pop();
    result
}

// -- Tests --------------------------------------------------------------------
