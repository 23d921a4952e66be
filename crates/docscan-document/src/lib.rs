// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docscan-document — Image-side work for the document scanner.
//
// Provides quad geometry (ordering, distances, scaling, validation), frame
// and still-image handling, document boundary detection on preview frames,
// and perspective rectification of captured stills.

pub mod geometry;
pub mod image;
pub mod scan;

// Re-export the primary structs so callers can use `docscan_document::DocumentDetector` etc.
pub use crate::image::frame::Frame;
pub use crate::image::processor::ImageProcessor;
pub use scan::detect::DocumentDetector;
pub use scan::rectify::{OutputSize, Rectifier};
