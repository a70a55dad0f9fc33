// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contour geometry — traced outlines with their area and perimeter, polygon
// simplification, and the minimum-area bounding rectangle used for skew
// estimation. The heavy lifting is `imageproc::geometry`.

use flatscan_core::geometry::Point;
use imageproc::geometry::{approximate_polygon_dp, arc_length, contour_area};
use imageproc::point::Point as PixelPoint;

/// Closed boundary traced from an edge map, tagged with its enclosed area.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub points: Vec<PixelPoint<i32>>,
    pub area: f64,
}

impl Contour {
    pub fn new(points: Vec<PixelPoint<i32>>) -> Self {
        let area = contour_area(&points);
        Self { points, area }
    }

    /// Length of the closed outline.
    pub fn perimeter(&self) -> f64 {
        arc_length(&self.points, true)
    }

    /// Simplify to a closed polygon whose edges deviate from the contour by
    /// at most `epsilon`. Degenerate input comes back unchanged.
    pub fn approximate(&self, epsilon: f64) -> Vec<PixelPoint<i32>> {
        if self.points.len() < 3 || epsilon.is_nan() || epsilon <= 0.0 {
            return self.points.clone();
        }
        approximate_polygon_dp(&self.points, epsilon, true)
    }
}

/// Bounding rectangle of minimum area, possibly rotated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    /// Length of the top edge.
    pub width: f64,
    /// Length of the right edge.
    pub height: f64,
    /// Direction of the top edge, in degrees (image coordinates).
    pub angle: f64,
}

impl RotatedRect {
    /// Describe the rectangle with corners ordered top-left, top-right,
    /// bottom-right, bottom-left.
    pub fn from_corners(corners: [PixelPoint<i32>; 4]) -> Self {
        let [tl, tr, br, _] = corners.map(|p| Point::new(p.x as f64, p.y as f64));
        let (sum_x, sum_y) = corners
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x as f64, sy + p.y as f64));
        Self {
            center: Point::new(sum_x / 4.0, sum_y / 4.0),
            width: (tr.x - tl.x).hypot(tr.y - tl.y),
            height: (br.x - tr.x).hypot(br.y - tr.y),
            angle: (tr.y - tl.y).atan2(tr.x - tl.x).to_degrees(),
        }
    }
}

/// Minimum-area enclosing rectangle of `points`. `None` for an empty set.
pub fn min_area_rect(points: &[PixelPoint<i32>]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }
    Some(RotatedRect::from_corners(imageproc::geometry::min_area_rect(points)))
}

/// Fold a rectangle angle into (-45°, 45°].
///
/// A rectangle's sides repeat every 90°, so only the offset from the nearest
/// axis matters.
pub fn normalize_skew_angle(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(90.0);
    if folded > 45.0 { folded - 90.0 } else { folded }
}
