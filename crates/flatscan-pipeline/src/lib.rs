// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan pipeline — the orchestrator between the camera/file collaborator
// and the document components. Owns every decision about fallbacks, runs all
// pixel work on background workers, and keeps live preview from lagging.

pub mod capture;
pub mod context;
pub mod preview;
pub mod stability;

pub use capture::{
    CaptureHandle, CaptureRequest, CaptureSession, CornerSource, ProcessedCapture, spawn_capture,
};
pub use context::ScanContext;
pub use preview::{BoundarySuggestion, PreviewSession, PreviewStats};
pub use stability::StabilityTracker;
