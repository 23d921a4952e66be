// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner session — wires frame analysis, stability tracking, and capture
// together.
//
// Frames are analysed on Tokio's blocking pool, one at a time; frames that
// arrive while analysis is running are dropped. Detection results flow over
// a channel to a single consumer task, which is the only writer of the
// stability state, and which forwards overlay events and fires automatic
// captures.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use docscan_bridge::{ImageStore, StillCamera};
use docscan_core::config::ScannerConfig;
use docscan_core::error::{Result, ScanError};
use docscan_core::types::{
    CaptureResult, CaptureState, DetectionEvent, DetectionResult, Quad, QuadVerdict,
};
use docscan_document::geometry::classify_quad;
use docscan_document::{DocumentDetector, Frame};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, trace, warn};

use crate::capture::{CaptureSlot, process_capture};
use crate::stability::{QuadSmoother, StabilityTracker};

/// Capacity of the overlay and capture event channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// What started a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTrigger {
    Manual,
    Auto,
}

/// Emitted on the capture sink once per capture that got past the
/// single-flight check.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CaptureEvent {
    Completed {
        trigger: CaptureTrigger,
        result: CaptureResult,
    },
    Failed {
        trigger: CaptureTrigger,
        reason: String,
    },
}

impl CaptureEvent {
    pub fn trigger(&self) -> CaptureTrigger {
        match self {
            Self::Completed { trigger, .. } | Self::Failed { trigger, .. } => *trigger,
        }
    }
}

/// Receiving ends handed to the host when a session starts.
#[derive(Debug)]
pub struct ScannerEvents {
    /// One event per analysed frame, for the overlay.
    pub detections: mpsc::Receiver<DetectionEvent>,
    pub captures: mpsc::Receiver<CaptureEvent>,
}

/// Tracker state guarded as one unit so the count and quads never disagree.
#[derive(Debug)]
struct Tracking {
    tracker: StabilityTracker,
    smoother: QuadSmoother,
    /// Latest detection that carried a quad; cleared when detection is lost.
    last_detection: Option<DetectionResult>,
}

/// State shared by every handle and background task of one session.
struct Inner {
    config: ScannerConfig,
    detector: DocumentDetector,
    camera: Arc<dyn StillCamera>,
    store: Arc<dyn ImageStore>,
    runtime: Handle,
    /// Set while a frame is being analysed.
    analysing: AtomicBool,
    /// Set from spawning an auto capture task until that task finishes.
    auto_pending: AtomicBool,
    /// Set after an auto capture when `capture_multiple` is off; cleared by
    /// `Scanner::reset`.
    auto_paused: AtomicBool,
    slot: CaptureSlot,
    tracking: Mutex<Tracking>,
    detections: mpsc::Sender<DetectionEvent>,
    captures: mpsc::Sender<CaptureEvent>,
}

/// Handle to a scanning session.
///
/// Cheap to clone; all clones drive the same session. The session winds
/// down once every handle has been dropped.
#[derive(Clone)]
pub struct Scanner {
    inner: Arc<Inner>,
    results: mpsc::Sender<Analysed>,
}

impl Scanner {
    /// Start a session.
    ///
    /// Must be called from within a Tokio runtime; the detection consumer
    /// task is spawned onto it.
    pub fn new(
        config: ScannerConfig,
        camera: Arc<dyn StillCamera>,
        store: Arc<dyn ImageStore>,
    ) -> Result<(Self, ScannerEvents)> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| {
            ScanError::InvalidConfig("scanner must be started inside a Tokio runtime".into())
        })?;

        let (detections_tx, detections_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (captures_tx, captures_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        // One frame in flight, so one slot is enough.
        let (results_tx, results_rx) = mpsc::channel(1);

        let inner = Arc::new(Inner {
            detector: DocumentDetector::new(config.detector.clone()),
            tracking: Mutex::new(Tracking {
                tracker: StabilityTracker::new(config.stability.clone()),
                smoother: QuadSmoother::new(&config.smoothing),
                last_detection: None,
            }),
            config,
            camera,
            store,
            runtime,
            analysing: AtomicBool::new(false),
            auto_pending: AtomicBool::new(false),
            auto_paused: AtomicBool::new(false),
            slot: CaptureSlot::new(),
            detections: detections_tx,
            captures: captures_tx,
        });

        inner
            .runtime
            .spawn(Inner::consume_detections(Arc::clone(&inner), results_rx));

        info!(
            threshold = inner.config.detection_count_before_capture,
            auto_capture = inner.config.auto_capture,
            policy = ?inner.config.stability.policy,
            "Scanner session started"
        );

        let scanner = Self {
            inner,
            results: results_tx,
        };
        let events = ScannerEvents {
            detections: detections_rx,
            captures: captures_rx,
        };
        Ok((scanner, events))
    }

    /// Offer a preview frame for analysis.
    ///
    /// Returns `false` if the frame was dropped because the previous one is
    /// still being analysed. Never blocks; safe to call from a camera
    /// callback thread.
    pub fn submit_frame(&self, frame: Frame) -> bool {
        let Some(busy) = AnalysisGuard::try_acquire(&self.inner) else {
            trace!("Frame dropped, analysis in flight");
            return false;
        };
        let results = self.results.clone();
        self.inner.runtime.spawn_blocking(move || {
            let result = busy.inner.detector.detect_frame(&frame);
            // The frame stays in flight until the consumer has recorded it.
            // Sending fails only while the session shuts down.
            let _ = results.blocking_send(Analysed { result, busy });
        });
        true
    }

    /// Take a capture now.
    ///
    /// Fails immediately with `CaptureInProgress` if another capture holds
    /// the slot, and with `CaptureUnavailable` if the camera is not ready.
    pub async fn capture(&self) -> Result<CaptureResult> {
        self.inner.capture(CaptureTrigger::Manual).await
    }

    /// Clear stability and smoothing state, and resume auto capture if it
    /// was paused. An in-flight capture is not affected.
    pub fn reset(&self) {
        self.inner.reset_tracking();
        self.inner.auto_paused.store(false, Ordering::Release);
        debug!("Stability state reset");
    }

    pub fn stable_count(&self) -> u32 {
        self.inner.tracking().tracker.stable_count()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.inner.slot.state()
    }

    /// Latest quad seen by the stability tracker, in preview coordinates.
    pub fn last_quad(&self) -> Option<Quad> {
        self.inner.tracking().tracker.last_quad().copied()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.inner.config
    }
}

/// A finished detection, still holding the analysis slot.
struct Analysed {
    result: DetectionResult,
    busy: AnalysisGuard,
}

/// Marks a frame as in flight; clears the flag on drop.
struct AnalysisGuard {
    inner: Arc<Inner>,
}

impl AnalysisGuard {
    fn try_acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .analysing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        self.inner.analysing.store(false, Ordering::Release);
    }
}

impl Inner {
    fn tracking(&self) -> MutexGuard<'_, Tracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_tracking(&self) {
        let mut tracking = self.tracking();
        tracking.tracker.reset();
        tracking.smoother.clear();
        tracking.last_detection = None;
    }

    /// The detection consumer. Runs until every `Scanner` handle is gone.
    async fn consume_detections(inner: Arc<Self>, mut results: mpsc::Receiver<Analysed>) {
        while let Some(Analysed { result, busy }) = results.recv().await {
            let event = inner.record(result);
            drop(busy);

            if inner.detections.try_send(event).is_err() {
                trace!("Overlay sink full or closed, event dropped");
            }

            if inner.claim_auto_capture(event.stable_count) {
                let session = Arc::clone(&inner);
                inner.runtime.spawn(async move {
                    // Losing the race to another capture is not worth reporting.
                    if let Err(err) = session.capture(CaptureTrigger::Auto).await {
                        debug!(error = %err, "Auto capture skipped");
                    }
                    session.auto_pending.store(false, Ordering::Release);
                });
            }
        }
        debug!("Detection consumer stopped");
    }

    /// Apply one detection to the tracker and build its overlay event.
    fn record(&self, result: DetectionResult) -> DetectionEvent {
        let quad = result.quad.filter(Quad::is_valid);
        let verdict = quad
            .as_ref()
            .map(|q| classify_quad(q, result.frame, &self.config.stability));

        let mut tracking = self.tracking();
        let stable_count = tracking
            .tracker
            .observe(quad.as_ref(), verdict.unwrap_or(QuadVerdict::Good));
        let overlay = tracking.smoother.push(quad.as_ref());
        tracking.last_detection = quad.map(|q| DetectionResult::new(Some(q), result.frame));
        drop(tracking);

        trace!(
            found = quad.is_some(),
            stable_count,
            ?verdict,
            "Frame analysed"
        );
        DetectionEvent::new(overlay, stable_count, result.frame, verdict)
    }

    /// Whether this frame should start an auto capture. At most one auto
    /// capture task exists at a time; a true return marks it pending.
    fn claim_auto_capture(&self, stable_count: u32) -> bool {
        self.config.auto_capture
            && stable_count >= self.config.detection_count_before_capture
            && !self.auto_paused.load(Ordering::Acquire)
            && self.slot.state() == CaptureState::Idle
            && self
                .auto_pending
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// Run one capture end to end under the single-flight slot.
    #[instrument(skip(self))]
    async fn capture(&self, trigger: CaptureTrigger) -> Result<CaptureResult> {
        let slot = self.slot.try_begin()?;
        info!("Capture started");

        let result = self.run_capture().await;
        // The next detection cycle starts clean whatever happened.
        self.reset_tracking();
        if trigger == CaptureTrigger::Auto && result.is_ok() && !self.config.capture_multiple {
            self.auto_paused.store(true, Ordering::Release);
            debug!("Auto capture paused until reset");
        }
        drop(slot);

        let event = match &result {
            Ok(capture) => {
                info!(id = %capture.id, cropped = capture.was_cropped(), "Capture complete");
                CaptureEvent::Completed {
                    trigger,
                    result: capture.clone(),
                }
            }
            Err(err) => {
                warn!(error = %err, "Capture failed");
                CaptureEvent::Failed {
                    trigger,
                    reason: err.to_string(),
                }
            }
        };
        if self.captures.send(event).await.is_err() {
            debug!("Capture sink closed");
        }
        result
    }

    async fn run_capture(&self) -> Result<CaptureResult> {
        if !self.camera.is_ready() {
            return Err(ScanError::CaptureUnavailable);
        }

        let camera = Arc::clone(&self.camera);
        let still = tokio::task::spawn_blocking(move || camera.capture_still())
            .await
            .map_err(|err| ScanError::ImageCreationFailed(format!("camera worker: {err}")))??;

        // Snapshot: later detections must not change the quad used for this still.
        let detection = self.tracking().last_detection;

        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            process_capture(&still, detection, &config, store.as_ref())
        })
        .await
        .map_err(|err| ScanError::ImageCreationFailed(format!("capture worker: {err}")))?
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use docscan_bridge::{DirectoryStore, FrameCamera, StillImage, StubBridge};
    use docscan_core::types::{ImagePayload, Rotation};
    use docscan_document::image::processor::encode_jpeg;
    use image::{DynamicImage, GrayImage, Luma};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(60);

    fn scene(doc: bool) -> DynamicImage {
        if doc {
            scene_with((100, 100, 540, 380))
        } else {
            DynamicImage::ImageLuma8(GrayImage::from_pixel(640, 480, Luma([25u8])))
        }
    }

    /// A bright document covering `(x0, y0)..(x1, y1)` of a dark 640x480 frame.
    fn scene_with(doc: (u32, u32, u32, u32)) -> DynamicImage {
        let (x0, y0, x1, y1) = doc;
        DynamicImage::ImageLuma8(GrayImage::from_fn(640, 480, |x, y| {
            if (x0..x1).contains(&x) && (y0..y1).contains(&y) {
                Luma([235u8])
            } else {
                Luma([25u8])
            }
        }))
    }

    fn frame(doc: bool) -> Frame {
        Frame::new(scene(doc), Rotation::Deg0)
    }

    fn ready_camera() -> Arc<FrameCamera> {
        let jpeg = encode_jpeg(&scene(true), 95).expect("encode");
        Arc::new(FrameCamera::with_still(StillImage::new(jpeg, Rotation::Deg0)))
    }

    fn config(threshold: u32, auto_capture: bool) -> ScannerConfig {
        ScannerConfig {
            detection_count_before_capture: threshold,
            auto_capture,
            use_base64: true,
            ..ScannerConfig::default()
        }
    }

    /// Submit a frame and wait for its overlay event.
    async fn analyse(scanner: &Scanner, events: &mut ScannerEvents, doc: bool) -> DetectionEvent {
        assert!(scanner.submit_frame(frame(doc)), "frame unexpectedly dropped");
        timeout(WAIT, events.detections.recv())
            .await
            .expect("detection timed out")
            .expect("detection channel closed")
    }

    /// Holding a document still fires exactly one automatic capture.
    #[tokio::test]
    async fn stable_document_triggers_auto_capture() {
        let (scanner, mut events) =
            Scanner::new(config(3, true), ready_camera(), Arc::new(StubBridge)).expect("scanner");

        for expected in 1..=3 {
            let event = analyse(&scanner, &mut events, true).await;
            assert_eq!(event.stable_count, expected);
            assert_eq!((event.frame_width, event.frame_height), (640, 480));
            assert!(event.quad.is_some());
        }

        let captured = timeout(WAIT, events.captures.recv())
            .await
            .expect("capture timed out")
            .expect("capture channel closed");
        let (trigger, result) = match captured {
            CaptureEvent::Completed { trigger, result } => (trigger, result),
            other => panic!("auto capture failed: {other:?}"),
        };
        assert_eq!(trigger, CaptureTrigger::Auto);
        assert!(result.was_cropped());
        assert!((result.cropped_width as i32 - 440).abs() <= 6, "{}", result.cropped_width);
        assert!((result.cropped_height as i32 - 280).abs() <= 6, "{}", result.cropped_height);

        // The tracker restarts after a capture.
        assert_eq!(scanner.stable_count(), 0);
        assert_eq!(scanner.capture_state(), CaptureState::Idle);
    }

    /// A still document covering about a tenth of the frame is classified
    /// too far, yet keeps counting under the default policy.
    #[tokio::test]
    async fn small_still_document_accumulates() {
        let (scanner, mut events) =
            Scanner::new(config(8, false), ready_camera(), Arc::new(StubBridge)).expect("scanner");

        for expected in 1..=5 {
            assert!(scanner.submit_frame(Frame::new(scene_with((220, 165, 420, 315)), Rotation::Deg0)));
            let event = timeout(WAIT, events.detections.recv())
                .await
                .expect("detection timed out")
                .expect("detection channel closed");
            assert!(event.quad.is_some());
            assert_eq!(event.verdict, Some(QuadVerdict::TooFar));
            assert_eq!(event.stable_count, expected);
        }
        assert_eq!(scanner.stable_count(), 5);
    }

    /// With `capture_multiple` off, auto capture fires once and resumes
    /// only after a reset.
    #[tokio::test]
    async fn single_auto_capture_pauses_until_reset() {
        let config = ScannerConfig {
            capture_multiple: false,
            ..config(2, true)
        };
        let (scanner, mut events) =
            Scanner::new(config, ready_camera(), Arc::new(StubBridge)).expect("scanner");

        analyse(&scanner, &mut events, true).await;
        analyse(&scanner, &mut events, true).await;
        let first = timeout(WAIT, events.captures.recv()).await.expect("capture timed out");
        assert!(matches!(first, Some(CaptureEvent::Completed { .. })));

        for expected in 1..=3 {
            assert_eq!(analyse(&scanner, &mut events, true).await.stable_count, expected);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(events.captures.try_recv().is_err());

        scanner.reset();
        analyse(&scanner, &mut events, true).await;
        analyse(&scanner, &mut events, true).await;
        let second = timeout(WAIT, events.captures.recv()).await.expect("capture timed out");
        assert_eq!(second.map(|e| e.trigger()), Some(CaptureTrigger::Auto));
    }

    /// Only one auto capture task is spawned while one is pending.
    #[tokio::test]
    async fn auto_capture_is_claimed_once() {
        let (scanner, _events) =
            Scanner::new(config(2, true), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        let inner = &scanner.inner;
        assert!(!inner.claim_auto_capture(1));
        assert!(inner.claim_auto_capture(2));
        assert!(!inner.claim_auto_capture(3));
        inner.auto_pending.store(false, Ordering::Release);
        assert!(inner.claim_auto_capture(3));
    }

    /// Two simultaneous manual captures: one runs, one is rejected.
    #[tokio::test]
    async fn concurrent_captures_are_single_flight() {
        let (scanner, mut events) =
            Scanner::new(config(8, false), ready_camera(), Arc::new(StubBridge)).expect("scanner");

        let (a, b) = tokio::join!(scanner.capture(), scanner.capture());
        let outcomes = [a, b];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let rejected = outcomes
            .iter()
            .filter(|r| matches!(r, Err(ScanError::CaptureInProgress)))
            .count();
        assert_eq!((successes, rejected), (1, 1));

        // Only the capture that ran is reported on the sink.
        let event = timeout(WAIT, events.captures.recv())
            .await
            .expect("capture timed out")
            .expect("capture channel closed");
        assert_eq!(event.trigger(), CaptureTrigger::Manual);
        assert!(events.captures.try_recv().is_err());
        assert_eq!(scanner.capture_state(), CaptureState::Idle);
    }

    /// Without any detection the cropped output is the original.
    #[tokio::test]
    async fn manual_capture_without_detection_returns_original() {
        let (scanner, _events) =
            Scanner::new(config(8, false), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        let result = scanner.capture().await.expect("capture");
        assert!(!result.was_cropped());
        assert_eq!(result.original, result.cropped);
        assert!(matches!(result.original, ImagePayload::Base64(_)));
    }

    /// Manual capture uses the latest detected quad.
    #[tokio::test]
    async fn manual_capture_uses_latest_detection() {
        let (scanner, mut events) =
            Scanner::new(config(8, false), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        analyse(&scanner, &mut events, true).await;
        assert_eq!(scanner.stable_count(), 1);

        let result = scanner.capture().await.expect("capture");
        assert!(result.was_cropped());
        assert_eq!(scanner.stable_count(), 0);
    }

    #[tokio::test]
    async fn capture_before_camera_ready_is_unavailable() {
        let (scanner, mut events) = Scanner::new(
            config(8, false),
            Arc::new(FrameCamera::new()),
            Arc::new(StubBridge),
        )
        .expect("scanner");
        let err = scanner.capture().await.err().expect("error");
        assert!(matches!(err, ScanError::CaptureUnavailable));
        assert_eq!(scanner.capture_state(), CaptureState::Idle);

        let event = events.captures.recv().await.expect("event");
        assert!(matches!(event, CaptureEvent::Failed { .. }));
    }

    /// A blank frame resets the counter and reports no quad.
    #[tokio::test]
    async fn lost_document_resets_count() {
        let (scanner, mut events) =
            Scanner::new(config(8, true), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        analyse(&scanner, &mut events, true).await;
        analyse(&scanner, &mut events, true).await;
        assert_eq!(scanner.stable_count(), 2);

        let event = analyse(&scanner, &mut events, false).await;
        assert_eq!(event.stable_count, 0);
        assert!(event.quad.is_none());
        assert!(event.verdict.is_none());
        assert!(scanner.last_quad().is_none());
    }

    #[tokio::test]
    async fn reset_clears_progress() {
        let (scanner, mut events) =
            Scanner::new(config(8, true), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        analyse(&scanner, &mut events, true).await;
        analyse(&scanner, &mut events, true).await;
        scanner.reset();
        assert_eq!(scanner.stable_count(), 0);
        assert_eq!(analyse(&scanner, &mut events, true).await.stable_count, 1);
    }

    /// Files land in the store when base64 is off.
    #[tokio::test]
    async fn file_capture_writes_both_outputs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ScannerConfig {
            auto_capture: false,
            ..ScannerConfig::default()
        };
        let (scanner, _events) = Scanner::new(
            config,
            ready_camera(),
            Arc::new(DirectoryStore::new(dir.path())),
        )
        .expect("scanner");

        let result = scanner.capture().await.expect("capture");
        for payload in [&result.original, &result.cropped] {
            let ImagePayload::File(path) = payload else {
                panic!("expected file payload");
            };
            assert!(path.starts_with(dir.path()));
            assert!(path.exists());
        }
    }

    /// The analysis gate admits one frame at a time.
    #[tokio::test]
    async fn analysis_gate_is_exclusive() {
        let (scanner, _events) =
            Scanner::new(config(8, false), ready_camera(), Arc::new(StubBridge)).expect("scanner");
        let first = AnalysisGuard::try_acquire(&scanner.inner).expect("first");
        assert!(AnalysisGuard::try_acquire(&scanner.inner).is_none());
        // A frame offered now is dropped.
        assert!(!scanner.submit_frame(frame(true)));
        drop(first);
        assert!(AnalysisGuard::try_acquire(&scanner.inner).is_some());
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = ScannerConfig {
            detection_count_before_capture: 0,
            ..ScannerConfig::default()
        };
        let err = Scanner::new(config, ready_camera(), Arc::new(StubBridge))
            .err()
            .expect("error");
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[test]
    fn scanner_requires_a_runtime() {
        let err = Scanner::new(ScannerConfig::default(), ready_camera(), Arc::new(StubBridge))
            .err()
            .expect("error");
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }
}
