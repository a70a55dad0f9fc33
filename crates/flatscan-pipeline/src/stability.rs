// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Auto-capture stability — fire once when the detected outline has held
// still for enough consecutive preview frames.

use flatscan_core::config::AutoCaptureConfig;
use flatscan_core::geometry::NormalizedQuad;
use tracing::debug;

/// Counts consecutive stable detections.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    config: AutoCaptureConfig,
    previous: Option<NormalizedQuad>,
    stable_frames: u32,
}

impl StabilityTracker {
    pub fn new(config: AutoCaptureConfig) -> Self {
        Self {
            config,
            previous: None,
            stable_frames: 0,
        }
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    /// Feed the latest detection. Returns `true` exactly once per run of
    /// `frames_required` stable frames, then starts counting again.
    ///
    /// A missing detection, a capture already in progress, or disabled
    /// auto-capture resets the count.
    pub fn observe(
        &mut self,
        detected: Option<&NormalizedQuad>,
        capture_in_progress: bool,
    ) -> bool {
        let Some(quad) = detected.filter(|_| self.config.enabled && !capture_in_progress) else {
            self.reset();
            return false;
        };

        let threshold = f64::from(self.config.stability_threshold);
        let stable = self
            .previous
            .as_ref()
            .is_some_and(|prev| prev.max_corner_displacement(quad) <= threshold);
        self.previous = Some(*quad);

        if !stable {
            self.stable_frames = 0;
            return false;
        }

        self.stable_frames += 1;
        if self.stable_frames >= self.config.frames_required {
            debug!(frames = self.stable_frames, "outline stable, triggering capture");
            self.stable_frames = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.stable_frames = 0;
    }
}
