// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module — preview frames, decoding, rotation, and JPEG output.

pub mod frame;
pub mod processor;

pub use frame::Frame;
pub use processor::ImageProcessor;
