// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture processing — rectify and enhance one confirmed photograph on a
// blocking worker.
//
// This is the only place that substitutes the default quadrilateral: when
// user corners fail geometric validation, rectification is retried once with
// the default outline. A capture can be cancelled at any time; cancellation
// is checked between stages and the partial output is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::geometry::NormalizedQuad;
use flatscan_core::human_errors::{HumanError, humanize_error};
use flatscan_core::types::{CaptureId, CaptureStatus, EnhancementMode};
use flatscan_document::RasterImage;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::context::ScanContext;

/// Where the page corners for a capture come from.
#[derive(Debug, Clone, PartialEq)]
pub enum CornerSource {
    /// Corners confirmed (and possibly dragged) by the user.
    Confirmed(NormalizedQuad),
    /// Corners in the `tlX,tlY,trX,trY,brX,brY,blX,blY` interchange form.
    /// Empty or malformed text means the default outline.
    Interchange(String),
    /// Run boundary detection on the capture itself, default outline if none.
    DetectOrDefault,
    /// No rectification; enhance the whole image with `mode`.
    Unrectified { mode: EnhancementMode },
}

/// One photograph to process.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub image: RasterImage,
    pub corners: CornerSource,
}

impl CaptureRequest {
    pub fn new(image: RasterImage, corners: CornerSource) -> Self {
        Self { image, corners }
    }
}

/// A finished capture, ready for the recognition collaborator.
#[derive(Debug, Clone)]
pub struct ProcessedCapture {
    pub id: CaptureId,
    pub image: RasterImage,
    /// Outline actually used for rectification, if any.
    pub corners: Option<NormalizedQuad>,
    /// Deskew rotation applied by enhancement, in degrees.
    pub rotation_applied: Option<f64>,
    /// Enhancement found and rectified a page outline itself.
    pub boundary_applied: bool,
    pub completed_at: DateTime<Utc>,
}

/// Handle to a capture running on a background worker.
pub struct CaptureHandle {
    id: CaptureId,
    cancel: Arc<AtomicBool>,
    task: JoinHandle<Result<ProcessedCapture>>,
}

impl CaptureHandle {
    pub fn id(&self) -> CaptureId {
        self.id
    }

    /// Discard the capture. The worker stops at the next stage boundary.
    pub fn cancel(&self) {
        info!(id = %self.id, "capture cancelled");
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Wait for the worker. A capture cancelled before this returns yields
    /// `Cancelled` and its output is dropped.
    pub async fn wait(self) -> Result<ProcessedCapture> {
        let outcome = match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(FlatscanError::Cancelled),
            Err(e) => Err(FlatscanError::Worker(format!("capture worker failed: {e}"))),
        };
        if self.cancel.load(Ordering::Relaxed) {
            return Err(FlatscanError::Cancelled);
        }
        outcome
    }
}

/// Start processing `request` on the blocking thread pool.
pub fn spawn_capture(ctx: Arc<ScanContext>, request: CaptureRequest) -> CaptureHandle {
    let id = CaptureId::new();
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    let task = tokio::task::spawn_blocking(move || process_capture(&ctx, id, request, &flag));
    CaptureHandle { id, cancel, task }
}

fn check_cancelled(cancel: &AtomicBool) -> Result<()> {
    if cancel.load(Ordering::Relaxed) {
        Err(FlatscanError::Cancelled)
    } else {
        Ok(())
    }
}

#[instrument(
    skip_all,
    fields(id = %id, width = request.image.width(), height = request.image.height())
)]
pub(crate) fn process_capture(
    ctx: &ScanContext,
    id: CaptureId,
    request: CaptureRequest,
    cancel: &AtomicBool,
) -> Result<ProcessedCapture> {
    check_cancelled(cancel)?;
    let CaptureRequest { image, corners } = request;

    let (page, used_corners, mode) = match corners {
        CornerSource::Confirmed(quad) => {
            let (page, quad) = rectify_with_fallback(ctx, &image, quad)?;
            (page, Some(quad), EnhancementMode::Finalize)
        }
        CornerSource::Interchange(text) => {
            let quad = NormalizedQuad::parse_interchange(&text).unwrap_or_else(|| {
                warn!(%text, "unusable corner string, using default outline");
                NormalizedQuad::default_fallback()
            });
            let (page, quad) = rectify_with_fallback(ctx, &image, quad)?;
            (page, Some(quad), EnhancementMode::Finalize)
        }
        CornerSource::DetectOrDefault => {
            let quad = ctx.detector().detect(&image).unwrap_or_else(|| {
                warn!("no page outline found, using default outline");
                NormalizedQuad::default_fallback()
            });
            check_cancelled(cancel)?;
            let (page, quad) = rectify_with_fallback(ctx, &image, quad)?;
            (page, Some(quad), EnhancementMode::Finalize)
        }
        CornerSource::Unrectified { mode } => (image, None, mode),
    };

    check_cancelled(cancel)?;
    let enhanced = ctx.enhancer().run(&page, mode)?;
    drop(page);
    check_cancelled(cancel)?;

    info!(
        width = enhanced.image.width(),
        height = enhanced.image.height(),
        ?mode,
        "capture processed"
    );
    Ok(ProcessedCapture {
        id,
        image: enhanced.image,
        corners: used_corners,
        rotation_applied: enhanced.rotation_applied,
        boundary_applied: enhanced.boundary_applied,
        completed_at: Utc::now(),
    })
}

/// Rectify with `quad`, retrying once with the default outline when the
/// corners are geometrically unusable.
fn rectify_with_fallback(
    ctx: &ScanContext,
    image: &RasterImage,
    quad: NormalizedQuad,
) -> Result<(RasterImage, NormalizedQuad)> {
    let quad = quad.clamped().canonicalize();
    match ctx.rectifier().rectify_normalized(image, &quad) {
        Ok(page) => Ok((page, quad)),
        Err(FlatscanError::InvalidGeometry(reason)) => {
            warn!(%reason, "corners rejected, retrying with default outline");
            let fallback = NormalizedQuad::default_fallback();
            let page = ctx.rectifier().rectify_normalized(image, &fallback)?;
            Ok((page, fallback))
        }
        Err(e) => Err(e),
    }
}

/// Capture results as the scanner screen sees them.
#[derive(Debug, Default)]
pub struct CaptureSession {
    last_success: Option<ProcessedCapture>,
    last_error: Option<HumanError>,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a capture outcome into the session. A failure is recorded as a
    /// human-readable error and never replaces the last successful capture;
    /// a cancellation changes nothing.
    pub fn record(&mut self, outcome: Result<ProcessedCapture>) -> CaptureStatus {
        match outcome {
            Ok(capture) => {
                info!(id = %capture.id, "capture completed");
                self.last_success = Some(capture);
                self.last_error = None;
                CaptureStatus::Completed
            }
            Err(FlatscanError::Cancelled) => CaptureStatus::Cancelled,
            Err(e) => {
                error!(error = %e, "capture failed");
                self.last_error = Some(humanize_error(&e));
                CaptureStatus::Failed
            }
        }
    }

    /// Await `handle` and record its outcome.
    pub async fn complete(&mut self, handle: CaptureHandle) -> CaptureStatus {
        let outcome = handle.wait().await;
        self.record(outcome)
    }

    pub fn last_capture(&self) -> Option<&ProcessedCapture> {
        self.last_success.as_ref()
    }

    pub fn last_error(&self) -> Option<&HumanError> {
        self.last_error.as_ref()
    }
}
