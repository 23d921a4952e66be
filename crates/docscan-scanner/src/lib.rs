// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-scanner — The live scanning session.
//
// Owns the per-session stability tracker, runs frame analysis off the
// caller's thread with a latest-wins policy, and orchestrates single-flight
// captures with rectification and fallback to the original still.

pub mod capture;
pub mod session;
pub mod stability;

pub use capture::{CaptureSlot, process_capture};
pub use session::{CaptureEvent, CaptureTrigger, Scanner, ScannerEvents};
pub use stability::{QuadSmoother, StabilityState, StabilityTracker};
