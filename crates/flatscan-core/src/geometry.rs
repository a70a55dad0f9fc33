// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry primitives — pixel and normalized points, canonically ordered
// quadrilaterals, and 3x3 homogeneous transforms.
//
// Pixel space and normalized [0,1] space are separate types. Crossing between
// them always goes through `to_pixels` / `normalize` with the dimensions of the
// image the coordinates refer to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_QUAD_MARGIN, MIN_RECTIFY_AREA, SINGULARITY_EPSILON};
use crate::error::{FlatscanError, Result};

// -- Points -------------------------------------------------------------------

/// Shared behaviour of the two coordinate spaces.
pub trait PlanarPoint: Copy + fmt::Debug + PartialEq {
    fn from_xy(x: f64, y: f64) -> Self;
    fn x(&self) -> f64;
    fn y(&self) -> f64;

    /// Euclidean distance to `other` in this point's own space.
    fn distance(&self, other: &Self) -> f64 {
        (self.x() - other.x()).hypot(self.y() - other.y())
    }

    fn is_finite(&self) -> bool {
        self.x().is_finite() && self.y().is_finite()
    }
}

/// A point in pixel space of a specific image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Express this point relative to an image of `width` x `height` pixels.
    pub fn normalize(self, width: u32, height: u32) -> NormalizedPoint {
        NormalizedPoint::new(self.x / width as f64, self.y / height as f64)
    }
}

impl PlanarPoint for Point {
    fn from_xy(x: f64, y: f64) -> Self {
        Self::new(x, y)
    }
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

/// A point in normalized space: (0,0) is the image's top-left corner and
/// (1,1) its bottom-right, independent of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into [0, 1].
    pub fn clamped(self) -> Self {
        Self::new(self.x.clamp(0.0, 1.0), self.y.clamp(0.0, 1.0))
    }

    /// Scale into the pixel space of a `width` x `height` image.
    pub fn to_pixel(self, width: u32, height: u32) -> Point {
        Point::new(self.x * width as f64, self.y * height as f64)
    }

    fn in_unit_range(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }
}

impl PlanarPoint for NormalizedPoint {
    fn from_xy(x: f64, y: f64) -> Self {
        Self::new(x, y)
    }
    fn x(&self) -> f64 {
        self.x
    }
    fn y(&self) -> f64 {
        self.y
    }
}

// -- Quadrilateral ------------------------------------------------------------

/// Four corners ordered top-left, top-right, bottom-right, bottom-left.
///
/// Every consumer (rectification, overlays, interchange) relies on that
/// order. Build from an arbitrary point set with [`Quadrilateral::from_unordered`];
/// [`Quadrilateral::from_ordered`] trusts the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral<P> {
    pub top_left: P,
    pub top_right: P,
    pub bottom_right: P,
    pub bottom_left: P,
}

/// Quadrilateral in pixel space.
pub type PixelQuad = Quadrilateral<Point>;

/// Quadrilateral in normalized space.
pub type NormalizedQuad = Quadrilateral<NormalizedPoint>;

impl<P: PlanarPoint> Quadrilateral<P> {
    /// Wrap corners that are already in TL, TR, BR, BL order.
    pub fn from_ordered(corners: [P; 4]) -> Self {
        let [top_left, top_right, bottom_right, bottom_left] = corners;
        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Canonically order an unordered set of four points.
    ///
    /// The two smallest-x points form the left pair and the two largest-x the
    /// right pair (ties broken by y so the result depends only on the point
    /// set). Within each pair the smaller y is the top corner.
    pub fn from_unordered(points: [P; 4]) -> Self {
        let mut sorted = points;
        sorted.sort_by(|a, b| a.x().total_cmp(&b.x()).then(a.y().total_cmp(&b.y())));

        let (top_left, bottom_left) = split_by_y(sorted[0], sorted[1]);
        let (top_right, bottom_right) = split_by_y(sorted[2], sorted[3]);

        Self {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        }
    }

    /// Corners in TL, TR, BR, BL order.
    pub fn corners(&self) -> [P; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Re-apply canonical ordering. Idempotent.
    pub fn canonicalize(&self) -> Self {
        Self::from_unordered(self.corners())
    }

    /// Whether the corners already satisfy the canonical ordering.
    pub fn is_canonical(&self) -> bool {
        self.canonicalize() == *self
    }

    pub fn is_finite(&self) -> bool {
        self.corners().iter().all(PlanarPoint::is_finite)
    }

    /// Enclosed area via the shoelace formula, in this quad's own units.
    pub fn area(&self) -> f64 {
        let corners = self.corners();
        let mut twice_area = 0.0;
        for i in 0..4 {
            let j = (i + 1) % 4;
            twice_area += corners[i].x() * corners[j].y();
            twice_area -= corners[j].x() * corners[i].y();
        }
        twice_area.abs() / 2.0
    }

    /// The longer of the top and bottom edges.
    pub fn max_width(&self) -> f64 {
        let bottom = self.bottom_right.distance(&self.bottom_left);
        let top = self.top_right.distance(&self.top_left);
        bottom.max(top)
    }

    /// The longer of the left and right edges.
    pub fn max_height(&self) -> f64 {
        let right = self.top_right.distance(&self.bottom_right);
        let left = self.top_left.distance(&self.bottom_left);
        right.max(left)
    }

    /// Largest per-axis movement of any corner between `self` and `other`.
    pub fn max_corner_displacement(&self, other: &Self) -> f64 {
        self.corners()
            .iter()
            .zip(other.corners().iter())
            .map(|(a, b)| (a.x() - b.x()).abs().max((a.y() - b.y()).abs()))
            .fold(0.0, f64::max)
    }
}

fn split_by_y<P: PlanarPoint>(a: P, b: P) -> (P, P) {
    if a.y() <= b.y() { (a, b) } else { (b, a) }
}

impl Quadrilateral<Point> {
    /// Axis-aligned rectangle spanning `(x0, y0)` to `(x1, y1)`.
    pub fn from_rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::from_ordered([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// Express the quad relative to an image of `width` x `height` pixels.
    pub fn normalize(&self, width: u32, height: u32) -> NormalizedQuad {
        Quadrilateral::from_ordered(self.corners().map(|p| p.normalize(width, height)))
    }

    /// Check that the quad can drive a perspective warp: finite, canonically
    /// ordered, and enclosing more than a sliver of area.
    pub fn validate_for_rectification(&self) -> Result<()> {
        if !self.is_finite() {
            return Err(FlatscanError::InvalidGeometry(
                "corner coordinates must be finite".into(),
            ));
        }
        if !self.is_canonical() {
            return Err(FlatscanError::InvalidGeometry(format!(
                "corners are not in top-left, top-right, bottom-right, bottom-left order: {:?}",
                self.corners()
            )));
        }
        let area = self.area();
        if area < MIN_RECTIFY_AREA {
            return Err(FlatscanError::InvalidGeometry(format!(
                "quadrilateral is degenerate (area {area:.3} px²)"
            )));
        }
        Ok(())
    }
}

impl Quadrilateral<NormalizedPoint> {
    /// Centered rectangle with corners at 10% / 90% of width and height, used
    /// when detection yields nothing and no prior quad exists.
    pub fn default_fallback() -> Self {
        let lo = DEFAULT_QUAD_MARGIN;
        let hi = 1.0 - DEFAULT_QUAD_MARGIN;
        Self::from_ordered([
            NormalizedPoint::new(lo, lo),
            NormalizedPoint::new(hi, lo),
            NormalizedPoint::new(hi, hi),
            NormalizedPoint::new(lo, hi),
        ])
    }

    /// Clamp every corner into [0, 1], as corner dragging does.
    pub fn clamped(&self) -> Self {
        Self::from_ordered(self.corners().map(NormalizedPoint::clamped))
    }

    /// Scale into the pixel space of a `width` x `height` image.
    pub fn to_pixels(&self, width: u32, height: u32) -> PixelQuad {
        Quadrilateral::from_ordered(self.corners().map(|p| p.to_pixel(width, height)))
    }

    /// Parse the `tlX,tlY,trX,trY,brX,brY,blX,blY` interchange form.
    ///
    /// Returns `None` for empty or malformed text: wrong value count,
    /// unparseable or non-finite numbers, or values outside [0, 1].
    pub fn parse_interchange(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let values = trimmed
            .split(',')
            .map(|part| part.trim().parse::<f64>().ok())
            .collect::<Option<Vec<f64>>>()?;
        if values.len() != 8 {
            return None;
        }

        let corners = [0, 2, 4, 6].map(|i| NormalizedPoint::new(values[i], values[i + 1]));
        if !corners.iter().all(|p| p.is_finite() && p.in_unit_range()) {
            return None;
        }
        Some(Self::from_ordered(corners))
    }

    /// Parse the interchange form, falling back to [`Self::default_fallback`]
    /// when the text is absent, empty, or malformed.
    pub fn resolve_corners(text: Option<&str>) -> Self {
        text.and_then(Self::parse_interchange)
            .unwrap_or_else(Self::default_fallback)
    }

    /// Serialize to the interchange form.
    pub fn to_interchange(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Quadrilateral<NormalizedPoint> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [tl, tr, br, bl] = self.corners();
        write!(
            f,
            "{},{},{},{},{},{},{},{}",
            tl.x, tl.y, tr.x, tr.y, br.x, br.y, bl.x, bl.y
        )
    }
}

impl FromStr for Quadrilateral<NormalizedPoint> {
    type Err = FlatscanError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_interchange(s).ok_or_else(|| {
            FlatscanError::InvalidGeometry(format!(
                "expected 8 comma-separated values in [0,1], got {s:?}"
            ))
        })
    }
}

// -- Transform matrix ---------------------------------------------------------

/// 3x3 homogeneous transform, row-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMatrix {
    rows: [[f64; 3]; 3],
}

impl TransformMatrix {
    pub const IDENTITY: Self = Self {
        rows: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> [[f64; 3]; 3] {
        self.rows
    }

    /// Solve the perspective transform taking each `src[i]` to `dst[i]`.
    ///
    /// Closed-form 8-DOF solve (h33 fixed to 1) by Gaussian elimination with
    /// partial pivoting. Returns `None` when the correspondences are
    /// degenerate (three or more collinear points).
    pub fn perspective(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        // Augmented 8x9 system: two rows per correspondence.
        let mut a = [[0.0f64; 9]; 8];
        for i in 0..4 {
            let (x, y) = (src[i].x, src[i].y);
            let (u, v) = (dst[i].x, dst[i].y);
            a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -x * u, -y * u, u];
            a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -x * v, -y * v, v];
        }

        for col in 0..8 {
            let pivot = (col..8).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
            if a[pivot][col].abs() < SINGULARITY_EPSILON {
                return None;
            }
            a.swap(col, pivot);

            let pivot_row = a[col];
            for (row, current) in a.iter_mut().enumerate() {
                if row == col {
                    continue;
                }
                let factor = current[col] / pivot_row[col];
                if factor != 0.0 {
                    for k in col..9 {
                        current[k] -= factor * pivot_row[k];
                    }
                }
            }
        }

        let h: [f64; 8] = std::array::from_fn(|i| a[i][8] / a[i][i]);
        let matrix = Self::from_rows([[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]]);
        matrix.is_finite().then_some(matrix)
    }

    /// Rotation by `degrees` about `center`, in image coordinates (y down),
    /// so positive angles turn clockwise on screen.
    pub fn rotation_about(center: Point, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let tx = center.x - cos * center.x + sin * center.y;
        let ty = center.y - sin * center.x - cos * center.y;
        Self::from_rows([[cos, -sin, tx], [sin, cos, ty], [0.0, 0.0, 1.0]])
    }

    /// Map a point through the transform. `None` when it lands at infinity.
    pub fn apply(&self, p: Point) -> Option<Point> {
        let r = &self.rows;
        let w = r[2][0] * p.x + r[2][1] * p.y + r[2][2];
        if w.abs() < SINGULARITY_EPSILON {
            return None;
        }
        Some(Point::new(
            (r[0][0] * p.x + r[0][1] * p.y + r[0][2]) / w,
            (r[1][0] * p.x + r[1][1] * p.y + r[1][2]) / w,
        ))
    }

    /// Row-major `f32` form, the layout `imageproc` projections are built from.
    pub fn to_row_major_f32(&self) -> [f32; 9] {
        let r = &self.rows;
        [
            r[0][0] as f32,
            r[0][1] as f32,
            r[0][2] as f32,
            r[1][0] as f32,
            r[1][1] as f32,
            r[1][2] as f32,
            r[2][0] as f32,
            r[2][1] as f32,
            r[2][2] as f32,
        ]
    }

    fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|v| v.is_finite())
    }
}

// -- Tests --------------------------------------------------------------------
