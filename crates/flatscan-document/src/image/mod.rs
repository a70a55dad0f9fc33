// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — the owned raster type, grayscale filters, and rotation.

pub mod processor;
pub mod raster;
pub mod warp;

pub use processor::ImageProcessor;
pub use raster::{ChannelLayout, RasterImage};
