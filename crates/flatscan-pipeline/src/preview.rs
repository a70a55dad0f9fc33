// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Live boundary preview.
//
// Camera frames arrive faster than detection can run. Frames go into a
// single-slot `watch` channel, so a newer frame replaces one that has not
// been picked up yet; the worker always analyses the most recent frame and
// older ones are dropped. A detection already in flight is never abandoned:
// its result is published even if newer frames arrived meanwhile.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use flatscan_core::geometry::NormalizedQuad;
use flatscan_document::RasterImage;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::ScanContext;
use crate::stability::StabilityTracker;

/// A frame waiting for analysis.
#[derive(Clone)]
struct QueuedFrame {
    sequence: u64,
    image: Arc<RasterImage>,
}

/// Result of analysing one preview frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundarySuggestion {
    /// Sequence number returned by `submit_frame` for the analysed frame.
    pub sequence: u64,
    /// Outline to draw: the detection, the last detection, or the default.
    pub quad: NormalizedQuad,
    /// Whether `quad` came from this frame's detection.
    pub detected: bool,
    /// Auto-capture fired on this frame.
    pub capture_ready: bool,
}

/// Frame accounting since the session started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub submitted: u64,
    pub analyzed: u64,
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    analyzed: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PreviewStats {
        PreviewStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            analyzed: self.analyzed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Background boundary detection for a live camera feed.
pub struct PreviewSession {
    frames: watch::Sender<Option<QueuedFrame>>,
    suggestions: watch::Receiver<Option<BoundarySuggestion>>,
    next_sequence: AtomicU64,
    counters: Arc<Counters>,
    capture_in_progress: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl PreviewSession {
    /// Start the preview worker on the current tokio runtime.
    pub fn spawn(ctx: Arc<ScanContext>) -> Self {
        let (frames, frame_rx) = watch::channel(None);
        let (suggestion_tx, suggestions) = watch::channel(None);
        let counters = Arc::new(Counters::default());
        let capture_in_progress = Arc::new(AtomicBool::new(false));

        let worker = tokio::spawn(Self::analysis_loop(
            ctx,
            frame_rx,
            suggestion_tx,
            Arc::clone(&counters),
            Arc::clone(&capture_in_progress),
        ));
        info!("preview session started");

        Self {
            frames,
            suggestions,
            next_sequence: AtomicU64::new(0),
            counters,
            capture_in_progress,
            worker,
        }
    }

    /// Queue `frame` for analysis, replacing any frame still waiting.
    /// Returns the frame's sequence number, starting at 1.
    pub fn submit_frame(&self, frame: RasterImage) -> u64 {
        let image = Arc::new(frame);
        let mut sequence = 0;
        // Numbering under the channel lock keeps sequences ordered in the slot.
        self.frames.send_modify(|slot| {
            sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed) + 1;
            *slot = Some(QueuedFrame { sequence, image });
        });
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        sequence
    }

    /// Watch the published suggestions. Holds `None` until the first frame
    /// has been analysed.
    pub fn subscribe(&self) -> watch::Receiver<Option<BoundarySuggestion>> {
        self.suggestions.clone()
    }

    /// Tell auto-capture that a capture is being processed.
    pub fn set_capture_in_progress(&self, in_progress: bool) {
        self.capture_in_progress.store(in_progress, Ordering::Relaxed);
    }

    /// Frame accounting so far. Frames still queued or in flight are
    /// counted as submitted only.
    pub fn stats(&self) -> PreviewStats {
        self.counters.snapshot()
    }

    /// Close the frame input, let the worker finish the last queued frame,
    /// and wait for it to exit.
    pub async fn shutdown(self) -> PreviewStats {
        let Self {
            frames, counters, worker, ..
        } = self;
        drop(frames);
        if let Err(e) = worker.await {
            warn!(error = %e, "preview worker ended abnormally");
        }
        let stats = counters.snapshot();
        info!(?stats, "preview session stopped");
        stats
    }

    async fn analysis_loop(
        ctx: Arc<ScanContext>,
        mut frames: watch::Receiver<Option<QueuedFrame>>,
        suggestions: watch::Sender<Option<BoundarySuggestion>>,
        counters: Arc<Counters>,
        capture_in_progress: Arc<AtomicBool>,
    ) {
        let mut tracker = StabilityTracker::new(ctx.config().auto_capture.clone());
        let mut last_detected: Option<NormalizedQuad> = None;
        let mut last_sequence = 0u64;

        // An unseen frame is still delivered after the sender is dropped.
        while frames.changed().await.is_ok() {
            let Some(frame) = frames.borrow_and_update().clone() else {
                continue;
            };
            let skipped = frame.sequence.saturating_sub(last_sequence + 1);
            if skipped > 0 {
                counters.dropped.fetch_add(skipped, Ordering::Relaxed);
                debug!(skipped, sequence = frame.sequence, "stale preview frames dropped");
            }
            last_sequence = frame.sequence;

            let detector_ctx = Arc::clone(&ctx);
            let image = Arc::clone(&frame.image);
            let task = tokio::task::spawn_blocking(move || detector_ctx.detector().detect(&image));
            let detection = match task.await {
                Ok(quad) => quad,
                Err(e) => {
                    warn!(
                        error = %e,
                        sequence = frame.sequence,
                        "boundary detection worker failed"
                    );
                    None
                }
            };
            drop(frame.image);
            counters.analyzed.fetch_add(1, Ordering::Relaxed);

            let in_progress = capture_in_progress.load(Ordering::Relaxed);
            let capture_ready = tracker.observe(detection.as_ref(), in_progress);
            if detection.is_some() {
                last_detected = detection;
            }
            let quad = detection
                .or(last_detected)
                .unwrap_or_else(NormalizedQuad::default_fallback);

            let suggestion = BoundarySuggestion {
                sequence: frame.sequence,
                quad,
                detected: detection.is_some(),
                capture_ready,
            };
            if capture_ready {
                info!(sequence = frame.sequence, "auto-capture triggered");
            }
            suggestions.send_replace(Some(suggestion));
        }
        debug!(last_sequence, "preview input closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use flatscan_core::config::{AutoCaptureConfig, ScanConfig};
    use image::{DynamicImage, GrayImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn context() -> Arc<ScanContext> {
        Arc::new(ScanContext::init(ScanConfig::default()).unwrap())
    }

    /// Context whose auto-capture fires after `frames_required` stable
    /// frames following the first sighting.
    fn quick_capture_context(frames_required: u32) -> Arc<ScanContext> {
        let config = ScanConfig {
            auto_capture: AutoCaptureConfig {
                frames_required,
                ..Default::default()
            },
            ..Default::default()
        };
        Arc::new(ScanContext::init(config).unwrap())
    }

    fn blank_frame() -> RasterImage {
        let gray = GrayImage::from_pixel(160, 120, Luma([128]));
        RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap()
    }

    fn page_frame_sized(width: u32, height: u32) -> RasterImage {
        let mut gray = GrayImage::from_pixel(width, height, Luma([30u8]));
        let (x, y) = (width as i32 * 3 / 20, height as i32 / 6);
        let page = Rect::at(x, y).of_size(width * 7 / 10, height * 2 / 3);
        draw_filled_rect_mut(&mut gray, page, Luma([230u8]));
        RasterImage::from_dynamic(DynamicImage::ImageLuma8(gray)).unwrap()
    }

    fn page_frame() -> RasterImage {
        page_frame_sized(400, 300)
    }

    async fn wait_for_sequence(
        rx: &mut watch::Receiver<Option<BoundarySuggestion>>,
        sequence: u64,
    ) -> BoundarySuggestion {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                if let Some(s) = *rx.borrow_and_update() {
                    if s.sequence == sequence {
                        return s;
                    }
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("suggestion was not published in time")
    }

    #[tokio::test]
    async fn blank_frame_suggests_default_quad() {
        let session = PreviewSession::spawn(context());
        let mut rx = session.subscribe();
        let seq = session.submit_frame(blank_frame());
        assert_eq!(seq, 1);

        let suggestion = wait_for_sequence(&mut rx, seq).await;
        assert!(!suggestion.detected);
        assert!(!suggestion.capture_ready);
        assert_eq!(suggestion.quad, NormalizedQuad::default_fallback());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn latest_frame_is_always_analysed() {
        let session = PreviewSession::spawn(context());
        let mut rx = session.subscribe();
        let mut last = 0;
        // The worker cannot run before this task yields, so only the last
        // frame is still queued when it wakes.
        for _ in 0..6 {
            last = session.submit_frame(blank_frame());
        }
        assert_eq!(last, 6);
        assert_eq!(session.stats().submitted, 6);
        let suggestion = wait_for_sequence(&mut rx, last).await;
        assert_eq!(suggestion.sequence, 6);

        let stats = session.shutdown().await;
        assert_eq!(
            stats,
            PreviewStats {
                submitted: 6,
                analyzed: 1,
                dropped: 5,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn frames_behind_an_in_flight_detection_collapse_to_the_newest() {
        let session = PreviewSession::spawn(context());
        let mut rx = session.subscribe();
        // Large enough that one detection outlasts the burst below.
        let page = page_frame_sized(1920, 1440);
        let mut frames = std::iter::repeat_n(page, 10);

        let first = session.submit_frame(frames.next().unwrap());
        // Give the idle worker time to take the first frame off the slot.
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut last = first;
        for frame in frames {
            last = session.submit_frame(frame);
        }
        assert_eq!(last, 10);

        // The in-flight frame is still published, then the newest one.
        wait_for_sequence(&mut rx, first).await;
        wait_for_sequence(&mut rx, last).await;

        let stats = session.shutdown().await;
        assert_eq!(
            stats,
            PreviewStats {
                submitted: 10,
                analyzed: 2,
                dropped: 8,
            }
        );
    }

    #[tokio::test]
    async fn steady_page_triggers_auto_capture() {
        let session = PreviewSession::spawn(quick_capture_context(3));
        let mut rx = session.subscribe();

        let mut ready = Vec::new();
        for _ in 0..4 {
            let seq = session.submit_frame(page_frame());
            ready.push(wait_for_sequence(&mut rx, seq).await.capture_ready);
        }
        // First sighting, then three stable frames.
        assert_eq!(ready, [false, false, false, true]);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn capture_in_progress_suppresses_auto_capture() {
        let session = PreviewSession::spawn(quick_capture_context(3));
        let mut rx = session.subscribe();

        session.set_capture_in_progress(true);
        for _ in 0..6 {
            let seq = session.submit_frame(page_frame());
            let suggestion = wait_for_sequence(&mut rx, seq).await;
            assert!(suggestion.detected);
            assert!(!suggestion.capture_ready);
        }

        session.set_capture_in_progress(false);
        let mut ready = Vec::new();
        for _ in 0..4 {
            let seq = session.submit_frame(page_frame());
            ready.push(wait_for_sequence(&mut rx, seq).await.capture_ready);
        }
        assert_eq!(ready, [false, false, false, true]);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn last_detection_is_kept_when_page_disappears() {
        let session = PreviewSession::spawn(context());
        let mut rx = session.subscribe();

        let seq = session.submit_frame(page_frame());
        let found = wait_for_sequence(&mut rx, seq).await;
        assert!(found.detected);

        let seq = session.submit_frame(blank_frame());
        let lost = wait_for_sequence(&mut rx, seq).await;
        assert!(!lost.detected);
        assert_eq!(lost.quad, found.quad);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_without_frames() {
        let session = PreviewSession::spawn(context());
        let stats = session.shutdown().await;
        assert_eq!(stats, PreviewStats::default());
    }
}
