// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the flatscan document pipeline.

use serde::{Deserialize, Serialize};

/// A point in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding box of one detected text block, in source-image
/// pixel coordinates. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBlock {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Union of all text blocks, padded and clamped to the image.
///
/// Used two ways: its centre biases quad selection towards the page that
/// carries the text, and the rectangle itself is the crop region when no
/// quad is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBoundsRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TextBoundsRect {
    /// Build the padded union of `blocks`, clamped to a `width` x `height`
    /// image. Returns `None` when there are no blocks.
    ///
    /// Padding on each side is `padding` times the union's own width/height,
    /// rounded to the nearest pixel. A zero-width union is treated as 1 px
    /// wide before padding.
    pub fn from_blocks(blocks: &[TextBlock], width: u32, height: u32, padding: f32) -> Option<Self> {
        let first = blocks.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) =
            (first.left, first.top, first.right, first.bottom);
        for block in &blocks[1..] {
            min_x = min_x.min(block.left);
            min_y = min_y.min(block.top);
            max_x = max_x.max(block.right);
            max_y = max_y.max(block.bottom);
        }

        let union_w = (max_x - min_x).max(1);
        let union_h = (max_y - min_y).max(1);
        let pad_x = (union_w as f32 * padding).round() as i32;
        let pad_y = (union_h as f32 * padding).round() as i32;

        Some(Self {
            left: (min_x - pad_x).max(0),
            top: (min_y - pad_y).max(0),
            right: (max_x + pad_x).min(width as i32),
            bottom: (max_y + pad_y).min(height as i32),
        })
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Centre of the rectangle in the same coordinate space.
    pub fn center(&self) -> Point {
        Point::new(
            (self.left + self.right) as f32 / 2.0,
            (self.top + self.bottom) as f32 / 2.0,
        )
    }
}

/// The four corners of a detected document, in source-image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerPoints {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl CornerPoints {
    /// Assign corner roles to four points given in any order.
    ///
    /// top-left minimises `x + y`, bottom-right maximises it; top-right
    /// maximises `x - y`, bottom-left minimises it. Assumes the quad is not
    /// rotated anywhere near 45 degrees.
    pub fn from_unordered(points: [Point; 4]) -> Self {
        fn sum(p: &Point) -> f32 {
            p.x + p.y
        }
        fn diff(p: &Point) -> f32 {
            p.x - p.y
        }

        // Ties keep the first point for `min_by` and the last for `max_by`.
        let min_of = |key: fn(&Point) -> f32| {
            points
                .iter()
                .copied()
                .min_by(|a, b| key(a).total_cmp(&key(b)))
                .unwrap_or(points[0])
        };
        let max_of = |key: fn(&Point) -> f32| {
            points
                .iter()
                .copied()
                .max_by(|a, b| key(a).total_cmp(&key(b)))
                .unwrap_or(points[3])
        };

        Self {
            top_left: min_of(sum),
            bottom_right: max_of(sum),
            top_right: max_of(diff),
            bottom_left: min_of(diff),
        }
    }

    /// Corners in top-left, top-right, bottom-right, bottom-left order.
    pub fn to_array(&self) -> [Point; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Area enclosed by the corners (shoelace formula).
    pub fn area(&self) -> f32 {
        let pts = self.to_array();
        let mut twice = 0.0f32;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice += pts[i].x * pts[j].y - pts[j].x * pts[i].y;
        }
        twice.abs() / 2.0
    }
}

/// Stored orientation of an encoded photo (EXIF tag 0x0112).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    /// Mirrored across the main diagonal.
    Transpose,
    Rotate90,
    /// Mirrored across the anti-diagonal.
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Map an EXIF orientation value (1..=8). Anything else is `Normal`.
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::FlipHorizontal,
            3 => Self::Rotate180,
            4 => Self::FlipVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }
}

/// PDF page size in points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// The 595x842 pt page used for scanned documents.
    pub const A4_POINTS: Self = Self {
        width_pt: 595.0,
        height_pt: 842.0,
    };
}

impl Default for PageSize {
    fn default() -> Self {
        Self::A4_POINTS
    }
}
