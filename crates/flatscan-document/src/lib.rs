// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// flatscan-document — Image correction for photographed documents.
//
// Provides the raster image type and resampling helpers, and the scanning
// pipeline proper: boundary detection, perspective rectification, skew
// correction and adaptive binarization, plus the seam to a text recognizer.

pub mod image;
pub mod scan;

// Re-export the primary structs so callers can use `flatscan_document::RasterImage` etc.
pub use crate::image::raster::{ChannelLayout, RasterImage};
pub use scan::detect::BoundaryDetector;
pub use scan::enhance::{EnhancedImage, EnhancementPipeline};
pub use scan::recognize::{RecognizedLine, RecognizedText, TextRecognizer};
pub use scan::rectify::PerspectiveRectifier;

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrsRecognizer;
