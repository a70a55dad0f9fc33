// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan configuration.
//
// Only the fields below are tunable. Edge thresholds, approximation tolerance
// and minimum areas are fixed, see `constants`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FlatscanError, Result};

/// Options for grayscale → denoise → adaptive threshold enhancement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    /// Side of the local neighbourhood for adaptive thresholding (odd, ≥ 3).
    pub block_size: u32,
    /// Offset subtracted from the local mean before comparison.
    pub threshold_constant: f32,
    /// Side of the Gaussian denoise kernel (odd; 1 disables denoising).
    pub blur_kernel: u32,
    /// Skew angles (degrees) below this magnitude are left alone.
    pub skew_angle_tolerance: f64,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            block_size: 35,
            threshold_constant: 10.0,
            blur_kernel: 3,
            skew_angle_tolerance: 0.5,
        }
    }
}

impl EnhancementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(FlatscanError::InvalidConfig(format!(
                "block_size must be an odd integer >= 3, got {}",
                self.block_size
            )));
        }
        if self.blur_kernel == 0 || self.blur_kernel % 2 == 0 {
            return Err(FlatscanError::InvalidConfig(format!(
                "blur_kernel must be an odd integer >= 1, got {}",
                self.blur_kernel
            )));
        }
        if !self.threshold_constant.is_finite() {
            return Err(FlatscanError::InvalidConfig(
                "threshold_constant must be finite".into(),
            ));
        }
        if !self.skew_angle_tolerance.is_finite() || self.skew_angle_tolerance < 0.0 {
            return Err(FlatscanError::InvalidConfig(format!(
                "skew_angle_tolerance must be a non-negative number of degrees, got {}",
                self.skew_angle_tolerance
            )));
        }
        Ok(())
    }
}

/// Hands-free capture once the detected outline holds still.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCaptureConfig {
    pub enabled: bool,
    /// Maximum per-axis corner movement (normalized) still counted as stable.
    pub stability_threshold: f32,
    /// Consecutive stable frames needed to trigger a capture.
    pub frames_required: u32,
}

impl Default for AutoCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stability_threshold: 0.02,
            frames_required: 20,
        }
    }
}

impl AutoCaptureConfig {
    pub fn validate(&self) -> Result<()> {
        let threshold = self.stability_threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(FlatscanError::InvalidConfig(format!(
                "stability_threshold must lie in [0, 1], got {}",
                self.stability_threshold
            )));
        }
        if self.frames_required == 0 {
            return Err(FlatscanError::InvalidConfig(
                "frames_required must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Complete persisted configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub enhancement: EnhancementConfig,
    pub auto_capture: AutoCaptureConfig,
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        self.enhancement.validate()?;
        self.auto_capture.validate()
    }

    /// Read and validate a JSON config file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        debug!(path = %path.display(), "loaded scan config");
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn persist(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "persisted scan config");
        Ok(())
    }
}
