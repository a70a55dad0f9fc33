// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognition seam.
//
// The recognizer is an external collaborator: it receives a corrected image
// and returns text. Nothing in the correction pipeline depends on how.

use flatscan_core::error::Result;
use serde::{Deserialize, Serialize};

use crate::image::raster::RasterImage;

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    pub text: String,
}

impl std::fmt::Display for RecognizedLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Everything a recognizer returns for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Full text, lines separated by `\n`.
    pub text: String,
    /// Engine-reported confidence in [0, 1], when the engine has one.
    pub confidence: Option<f32>,
    pub lines: Vec<RecognizedLine>,
}

impl RecognizedText {
    /// Assemble from individual lines, dropping blank ones.
    pub fn from_lines(lines: impl IntoIterator<Item = String>, confidence: Option<f32>) -> Self {
        let lines: Vec<RecognizedLine> = lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .map(|text| RecognizedLine { text })
            .collect();
        let text = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
        Self {
            text,
            confidence,
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An engine that turns a prepared page image into text.
pub trait TextRecognizer: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    fn recognize(&self, image: &RasterImage) -> Result<RecognizedText>;
}
