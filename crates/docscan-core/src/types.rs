// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the docscan document scanner.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coordinates beyond this magnitude are treated as detector corruption.
pub const POINT_SANITY_BOUND: f64 = 1_000_000.0;

/// A 2D point in a fixed reference frame (frame pixels or image pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Finite and within `±POINT_SANITY_BOUND` on both axes.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.x.abs() <= POINT_SANITY_BOUND
            && self.y.abs() <= POINT_SANITY_BOUND
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Four points in canonical order `[top_left, top_right, bottom_right, bottom_left]`.
///
/// The type guarantees cardinality but not sanity: detectors can still emit
/// non-finite or collinear corners, which downstream code must reject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub const fn new(top_left: Point, top_right: Point, bottom_right: Point, bottom_left: Point) -> Self {
        Self {
            points: [top_left, top_right, bottom_right, bottom_left],
        }
    }

    /// Build a quad from an arbitrary slice; `None` unless it holds exactly four points.
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; 4] = points.try_into().ok()?;
        Some(Self { points })
    }

    /// Axis-aligned rectangle spanning `(x0, y0)` to `(x1, y1)`.
    pub fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        )
    }

    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn top_right(&self) -> Point {
        self.points[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.points[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.points[3]
    }

    /// True iff all four points are valid.
    pub fn is_valid(&self) -> bool {
        self.points.iter().all(Point::is_valid)
    }
}

/// Pixel dimensions of a frame or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Clockwise rotation needed to bring a sensor buffer upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Map a platform angle in degrees; only multiples of 90 are accepted.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    /// Whether width and height trade places when applied.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Size of a `width x height` buffer after rotation.
    pub fn apply_to(&self, size: FrameSize) -> FrameSize {
        if self.swaps_axes() {
            FrameSize::new(size.height, size.width)
        } else {
            size
        }
    }
}

/// Quality classification of a detected quad, used by the soft-decay
/// stability policy and by overlays to prompt the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuadVerdict {
    /// Usable for auto-capture.
    Good,
    /// Perspective too strong: a corner is far from a right angle.
    BadAngle,
    /// Document occupies too little of the frame.
    TooFar,
}

/// Output of one detector pass over one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub quad: Option<Quad>,
    /// Upright dimensions of the frame the quad was detected against.
    pub frame: FrameSize,
}

impl DetectionResult {
    pub fn new(quad: Option<Quad>, frame: FrameSize) -> Self {
        Self { quad, frame }
    }

    pub fn none(frame: FrameSize) -> Self {
        Self { quad: None, frame }
    }
}

/// Per-frame payload forwarded to the overlay sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionEvent {
    pub quad: Option<Quad>,
    pub stable_count: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub verdict: Option<QuadVerdict>,
}

impl DetectionEvent {
    /// Invalid quads are dropped here so a sink never receives corrupt corners.
    pub fn new(
        quad: Option<Quad>,
        stable_count: u32,
        frame: FrameSize,
        verdict: Option<QuadVerdict>,
    ) -> Self {
        let quad = quad.filter(Quad::is_valid);
        Self {
            quad,
            stable_count,
            frame_width: frame.width,
            frame_height: frame.height,
            verdict: quad.and(verdict),
        }
    }
}

/// Encoded image handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImagePayload {
    /// JPEG written to disk.
    File(PathBuf),
    /// JPEG bytes, base64 encoded.
    Base64(String),
}

/// Result of one completed capture. Ownership passes to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub id: Uuid,
    pub original: ImagePayload,
    /// Equal in content to `original` when no rectification was possible.
    pub cropped: ImagePayload,
    /// Original capture width.
    pub width: u32,
    /// Original capture height.
    pub height: u32,
    pub cropped_width: u32,
    pub cropped_height: u32,
    /// Quad used for rectification, in capture pixel coordinates.
    pub quad: Option<Quad>,
    pub captured_at: DateTime<Utc>,
}

impl CaptureResult {
    /// Whether rectification actually happened.
    pub fn was_cropped(&self) -> bool {
        self.quad.is_some()
    }
}

/// Lifecycle of the single-flight capture slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CaptureState {
    Idle = 0,
    Capturing = 1,
}

impl CaptureState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Capturing,
            _ => Self::Idle,
        }
    }
}
