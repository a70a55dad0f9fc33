// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanning pipeline — boundary detection, perspective rectification, skew
// correction and binarization, and the hand-off to optical character
// recognition (OCR).

pub mod contour;
pub mod detect;
pub mod enhance;
pub mod recognize;
pub mod rectify;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use detect::BoundaryDetector;
pub use enhance::{EnhancedImage, EnhancementPipeline};
pub use recognize::{RecognizedLine, RecognizedText, TextRecognizer};
pub use rectify::PerspectiveRectifier;

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsRecognizer};
