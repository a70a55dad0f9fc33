// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fixed implementation constants.
//
// None of these are runtime-configurable. `EnhancementConfig` carries the only
// tunables; everything here was chosen empirically for phone-camera frames of
// printed pages and applies to every call.

/// Downscale factor applied before boundary analysis.
pub const ANALYSIS_SCALE: f64 = 0.5;

/// Side length of the Gaussian kernel used to suppress sensor noise before
/// edge detection.
pub const DETECTION_BLUR_KERNEL: u32 = 5;

/// Canny hysteresis thresholds.
pub const CANNY_LOW_THRESHOLD: f32 = 75.0;
pub const CANNY_HIGH_THRESHOLD: f32 = 200.0;

/// Radius (L-infinity) of the dilation that closes one-pixel gaps in the
/// edge map so document outlines trace as closed contours.
pub const EDGE_CLOSING_RADIUS: u8 = 1;

/// Polygon approximation tolerance as a fraction of the contour perimeter.
pub const APPROX_EPSILON_RATIO: f64 = 0.02;

/// Contours enclosing less than this many square pixels (at analysis scale)
/// are treated as noise.
pub const MIN_CONTOUR_AREA: f64 = 1000.0;

/// Quadrilaterals enclosing less than this many square pixels cannot be
/// rectified.
pub const MIN_RECTIFY_AREA: f64 = 1.0;

/// Fraction of the frame left as margin on each side by the default
/// quadrilateral (corners at 10% / 90%).
pub const DEFAULT_QUAD_MARGIN: f64 = 0.1;

/// Pivot magnitude below which the homography system is considered singular.
pub const SINGULARITY_EPSILON: f64 = 1e-10;
