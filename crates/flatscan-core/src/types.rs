// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Flatscan capture pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one capture (one confirmed photograph of a page).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureId(pub Uuid);

impl CaptureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptureId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CaptureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a capture ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureStatus {
    /// Finished; a corrected image is available.
    Completed,
    /// Failed; see the session's last error.
    Failed,
    /// Discarded by the user before it finished.
    Cancelled,
}

/// Which enhancement path an image takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancementMode {
    /// Image is already a flat, cropped page: binarize only.
    #[default]
    Finalize,
    /// No confirmed corners: correct residual skew, then binarize.
    AutoEnhance,
    /// Find the page outline on the grayscale image and rectify it, then
    /// binarize. Falls back to `AutoEnhance` when no outline is found.
    FullAuto,
}
