// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stability tracking — counts consecutive near-identical detections so the
// session knows when the document has been held still long enough to capture.
//
// Also hosts the overlay smoother, which damps corner jitter in the quad sent
// to the UI. The smoother never feeds back into the stability metric.

use std::collections::VecDeque;

use docscan_core::config::{SmoothingConfig, StabilityConfig, StabilityPolicy};
use docscan_core::types::{Quad, QuadVerdict};
use docscan_document::geometry::{blend_quads, is_valid_quad, quad_distance, weighted_average_quad};
use tracing::trace;

/// Observable tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StabilityState {
    /// `stable_count == 0`.
    Unstable,
    /// At least one stable frame counted.
    Accumulating,
}

/// Per-session stability counter.
///
/// One instance per scanner session; mutated only by the detection consumer.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    config: StabilityConfig,
    last_quad: Option<Quad>,
    stable_count: u32,
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

impl StabilityTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            last_quad: None,
            stable_count: 0,
        }
    }

    /// Feed one detection, treating any valid quad as usable.
    pub fn update(&mut self, current: Option<&Quad>) -> u32 {
        self.observe(current, QuadVerdict::Good)
    }

    /// Feed one detection together with its quality verdict.
    ///
    /// Missing or invalid quads always reset. Under `HardReset` the verdict
    /// is ignored and only movement between frames matters; under
    /// `DecayOnBadFrame` a non-`Good` verdict takes one off the counter.
    /// Returns the new stable count.
    pub fn observe(&mut self, current: Option<&Quad>, verdict: QuadVerdict) -> u32 {
        let Some(current) = current.filter(|q| is_valid_quad(q)) else {
            self.reset();
            return 0;
        };

        if verdict != QuadVerdict::Good && self.config.policy == StabilityPolicy::DecayOnBadFrame {
            self.stable_count = self.stable_count.saturating_sub(1);
            self.last_quad = Some(*current);
            trace!(?verdict, stable_count = self.stable_count, "Poor detection");
            return self.stable_count;
        }

        self.stable_count = match &self.last_quad {
            None => 1,
            Some(last) => {
                let diff = quad_distance(current, last);
                if diff < self.config.distance {
                    self.stable_count.saturating_add(1)
                } else {
                    trace!(diff, "Quad moved");
                    0
                }
            }
        };
        self.last_quad = Some(*current);
        self.stable_count
    }

    pub fn reset(&mut self) {
        self.last_quad = None;
        self.stable_count = 0;
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }

    pub fn last_quad(&self) -> Option<&Quad> {
        self.last_quad.as_ref()
    }

    pub fn state(&self) -> StabilityState {
        if self.stable_count == 0 {
            StabilityState::Unstable
        } else {
            StabilityState::Accumulating
        }
    }

    /// Whether at least `threshold` stable frames have been counted.
    pub fn is_stable(&self, threshold: u32) -> bool {
        self.stable_count >= threshold
    }
}

/// Damps frame-to-frame jitter in the overlay quad.
///
/// Keeps the last `window` quads, averages them with recency weights, then
/// blends the previous output towards that average.
#[derive(Debug, Clone)]
pub struct QuadSmoother {
    window: usize,
    blend_alpha: f64,
    history: VecDeque<Quad>,
    output: Option<Quad>,
}

impl Default for QuadSmoother {
    fn default() -> Self {
        Self::new(&SmoothingConfig::default())
    }
}

impl QuadSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        let window = config.window.max(1);
        Self {
            window,
            blend_alpha: config.blend_alpha,
            history: VecDeque::with_capacity(window),
            output: None,
        }
    }

    /// Push the latest detection and return the quad to display. A missing
    /// detection clears the history.
    pub fn push(&mut self, quad: Option<&Quad>) -> Option<Quad> {
        let Some(quad) = quad.filter(|q| is_valid_quad(q)) else {
            self.clear();
            return None;
        };

        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(*quad);

        let average = weighted_average_quad(self.history.make_contiguous()).ok()?;
        let smoothed = match &self.output {
            Some(previous) => blend_quads(previous, &average, self.blend_alpha),
            None => average,
        };
        self.output = Some(smoothed);
        self.output
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.output = None;
    }
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use docscan_core::types::Point;

    fn doc() -> Quad {
        Quad::rect(100.0, 100.0, 540.0, 380.0)
    }

    fn shifted(q: &Quad, dx: f64) -> Quad {
        Quad {
            points: q.points.map(|p| Point::new(p.x + dx, p.y)),
        }
    }

    fn decaying() -> StabilityTracker {
        StabilityTracker::new(StabilityConfig {
            policy: StabilityPolicy::DecayOnBadFrame,
            ..StabilityConfig::default()
        })
    }

    /// The same quad N times counts N stable frames.
    #[test]
    fn identical_quads_accumulate() {
        let mut tracker = StabilityTracker::default();
        for n in 1..=10 {
            assert_eq!(tracker.update(Some(&doc())), n);
        }
        assert_eq!(tracker.state(), StabilityState::Accumulating);
        assert!(tracker.is_stable(8));
    }

    /// A lost detection resets everything.
    #[test]
    fn absence_resets() {
        let mut tracker = StabilityTracker::default();
        tracker.update(Some(&doc()));
        tracker.update(Some(&doc()));
        assert_eq!(tracker.update(None), 0);
        assert_eq!(tracker.state(), StabilityState::Unstable);
        assert!(tracker.last_quad().is_none());
        // First valid frame after a gap counts as one.
        assert_eq!(tracker.update(Some(&doc())), 1);
    }

    /// Quads that jump by the threshold every frame never get past one.
    #[test]
    fn constant_motion_never_accumulates() {
        let mut tracker = StabilityTracker::default();
        let mut quad = doc();
        let mut max_seen = 0;
        for _ in 0..20 {
            max_seen = max_seen.max(tracker.update(Some(&quad)));
            quad = shifted(&quad, 8.0);
        }
        assert_eq!(max_seen, 1);
    }

    /// Small jitter below the threshold still counts as stable.
    #[test]
    fn small_jitter_is_stable() {
        let mut tracker = StabilityTracker::default();
        tracker.update(Some(&doc()));
        assert_eq!(tracker.update(Some(&shifted(&doc(), 3.0))), 2);
        assert_eq!(tracker.update(Some(&shifted(&doc(), -3.0))), 3);
        assert_eq!(tracker.last_quad(), Some(&shifted(&doc(), -3.0)));
    }

    /// Corrupt quads are treated like no detection.
    #[test]
    fn invalid_quad_resets() {
        let mut tracker = StabilityTracker::default();
        tracker.update(Some(&doc()));
        let mut bad = doc();
        bad.points[2].x = f64::NAN;
        assert_eq!(tracker.update(Some(&bad)), 0);
        assert!(tracker.last_quad().is_none());
    }

    /// Hard reset only looks at movement; a small or skewed document that
    /// holds still keeps counting.
    #[test]
    fn hard_reset_ignores_verdict() {
        let mut tracker = StabilityTracker::default();
        for n in 1..=4 {
            assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::TooFar), n);
        }
        assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::BadAngle), 5);
        assert_eq!(tracker.observe(Some(&shifted(&doc(), 20.0)), QuadVerdict::BadAngle), 0);
    }

    /// Decay policy only takes one off per bad frame.
    #[test]
    fn decay_on_bad_verdict() {
        let mut tracker = decaying();
        for _ in 0..5 {
            tracker.update(Some(&doc()));
        }
        assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::TooFar), 4);
        assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::BadAngle), 3);
        assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::Good), 4);
    }

    /// Decay saturates at zero, and absence still resets fully.
    #[test]
    fn decay_saturates_and_absence_still_resets() {
        let mut tracker = decaying();
        assert_eq!(tracker.observe(Some(&doc()), QuadVerdict::TooFar), 0);
        tracker.update(Some(&doc()));
        tracker.update(Some(&doc()));
        assert_eq!(tracker.update(None), 0);
    }

    /// Independent trackers do not share state.
    #[test]
    fn trackers_are_independent() {
        let mut a = StabilityTracker::default();
        let b = StabilityTracker::default();
        a.update(Some(&doc()));
        a.update(Some(&doc()));
        assert_eq!(a.stable_count(), 2);
        assert_eq!(b.stable_count(), 0);
    }

    /// With the default window of one the smoother is a pass-through.
    #[test]
    fn default_smoother_passes_through() {
        let mut smoother = QuadSmoother::default();
        assert_eq!(smoother.push(Some(&doc())), Some(doc()));
        let moved = shifted(&doc(), 20.0);
        assert_eq!(smoother.push(Some(&moved)), Some(moved));
    }

    /// A wider window lags behind a sudden jump.
    #[test]
    fn smoother_damps_jumps() {
        let mut smoother = QuadSmoother::new(&SmoothingConfig {
            window: 3,
            blend_alpha: 0.5,
        });
        smoother.push(Some(&doc()));
        let out = smoother.push(Some(&shifted(&doc(), 30.0))).expect("quad");
        let moved = out.top_left().x - 100.0;
        assert!(moved > 0.0 && moved < 30.0, "moved {moved}");
    }

    #[test]
    fn smoother_clears_on_loss() {
        let mut smoother = QuadSmoother::default();
        smoother.push(Some(&doc()));
        assert_eq!(smoother.push(None), None);
        let moved = shifted(&doc(), 50.0);
        assert_eq!(smoother.push(Some(&moved)), Some(moved));
    }
}
