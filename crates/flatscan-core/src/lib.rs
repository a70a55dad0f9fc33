// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan — Geometry primitives, core types, and error definitions shared
// across all crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod human_errors;
pub mod types;

pub use config::{AutoCaptureConfig, EnhancementConfig, ScanConfig};
pub use error::FlatscanError;
pub use geometry::{
    NormalizedPoint, NormalizedQuad, PixelQuad, PlanarPoint, Point, Quadrilateral, TransformMatrix,
};
pub use types::*;
