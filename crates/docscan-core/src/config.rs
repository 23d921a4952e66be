// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::types::Point;

/// Lowest JPEG quality the scanner will ever encode at.
pub const QUALITY_FLOOR: u8 = 95;

/// How the stability counter reacts to a detected but poorly framed quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityPolicy {
    /// Only a lost detection or a moved quad drops the counter to zero;
    /// framing quality is ignored.
    #[default]
    HardReset,
    /// Bad-angle and too-far frames decrement by one; only a lost detection
    /// resets.
    DecayOnBadFrame,
}

/// Stability tracking parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub policy: StabilityPolicy,
    /// Mean corner motion (reference-frame units) below which two consecutive
    /// detections count as stable.
    pub distance: f64,
    /// Quads covering less than this share of the frame are `TooFar`.
    pub min_area_ratio: f64,
    /// Corners further than this from 90 degrees make a quad `BadAngle`.
    pub max_corner_deviation_deg: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            policy: StabilityPolicy::HardReset,
            distance: 8.0,
            min_area_ratio: 0.2,
            max_corner_deviation_deg: 25.0,
        }
    }
}

/// Edge/contour pipeline parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// CLAHE clip limit, as a multiple of the mean histogram bin height.
    pub clahe_clip_limit: f32,
    /// CLAHE tiles per axis.
    pub clahe_tiles: u32,
    /// Gaussian sigma; 1.1 matches a 5x5 kernel.
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Closing radius in pixels (1 = 3x3, 2 = 5x5).
    pub close_radius: u8,
    /// Douglas-Peucker tolerance as a fraction of contour perimeter.
    pub approx_epsilon_ratio: f64,
    pub min_area_ratio: f64,
    pub max_area_ratio: f64,
    /// Absolute area floor in square pixels.
    pub min_area_px: f64,
    /// Downscale frames whose longer side exceeds this before analysis.
    pub max_analysis_dimension: Option<u32>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            blur_sigma: 1.1,
            canny_low: 40.0,
            canny_high: 140.0,
            close_radius: 1,
            approx_epsilon_ratio: 0.02,
            min_area_ratio: 0.05,
            max_area_ratio: 0.98,
            min_area_px: 1000.0,
            max_analysis_dimension: None,
        }
    }
}

/// Per-corner offsets, in capture pixels, added after scaling a detected quad
/// to capture resolution. Zero unless calibrated against a specific camera.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerCalibration {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl CornerCalibration {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    pub fn offsets(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }
}

/// Overlay smoothing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of recent quads averaged; 1 disables smoothing.
    pub window: usize,
    /// Blend factor towards the averaged quad each frame.
    pub blend_alpha: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 1,
            blend_alpha: 1.0,
        }
    }
}

/// Scanner session settings recognised from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Stable frames required before an automatic capture fires.
    pub detection_count_before_capture: u32,
    /// Whether reaching the threshold captures automatically.
    pub auto_capture: bool,
    /// Keep capturing automatically after the first auto capture. When off,
    /// auto capture pauses until the session is reset.
    pub capture_multiple: bool,
    /// Requested JPEG quality (0-100); see [`ScannerConfig::effective_quality`].
    pub quality: u8,
    /// Return base64 bytes instead of file paths.
    pub use_base64: bool,
    /// Directory for captured files. `None` leaves the choice to the host.
    pub output_dir: Option<PathBuf>,
    pub stability: StabilityConfig,
    pub detector: DetectorConfig,
    pub corner_offsets: CornerCalibration,
    pub smoothing: SmoothingConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            detection_count_before_capture: 8,
            auto_capture: true,
            capture_multiple: true,
            quality: 100,
            use_base64: false,
            output_dir: None,
            stability: StabilityConfig::default(),
            detector: DetectorConfig::default(),
            corner_offsets: CornerCalibration::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Quality actually passed to the encoder.
    pub fn effective_quality(&self) -> u8 {
        self.quality.clamp(QUALITY_FLOOR, 100)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ScanError::InvalidConfig(msg.to_string()));

        if self.detection_count_before_capture == 0 {
            return invalid("detection_count_before_capture must be at least 1");
        }
        if self.quality > 100 {
            return invalid("quality must be within 0..=100");
        }
        if !(self.stability.distance.is_finite() && self.stability.distance > 0.0) {
            return invalid("stability.distance must be positive");
        }
        if !(0.0..=1.0).contains(&self.stability.min_area_ratio) {
            return invalid("stability.min_area_ratio must be within 0..=1");
        }
        if !(0.0..90.0).contains(&self.stability.max_corner_deviation_deg) {
            return invalid("stability.max_corner_deviation_deg must be within 0..90");
        }

        let d = &self.detector;
        if d.clahe_tiles == 0 {
            return invalid("detector.clahe_tiles must be at least 1");
        }
        if d.clahe_clip_limit <= 0.0 || d.blur_sigma <= 0.0 {
            return invalid("detector clip limit and blur sigma must be positive");
        }
        if d.canny_low > d.canny_high {
            return invalid("detector.canny_low must not exceed canny_high");
        }
        if !(d.min_area_ratio >= 0.0 && d.min_area_ratio < d.max_area_ratio && d.max_area_ratio <= 1.0) {
            return invalid("detector area ratios must satisfy 0 <= min < max <= 1");
        }
        if d.approx_epsilon_ratio <= 0.0 {
            return invalid("detector.approx_epsilon_ratio must be positive");
        }
        if d.max_analysis_dimension == Some(0) {
            return invalid("detector.max_analysis_dimension must be non-zero");
        }

        if self.smoothing.window == 0 {
            return invalid("smoothing.window must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.smoothing.blend_alpha) {
            return invalid("smoothing.blend_alpha must be within 0..=1");
        }
        if !self.corner_offsets.offsets().iter().all(Point::is_valid) {
            return invalid("corner_offsets must be finite");
        }
        Ok(())
    }

    /// Load settings from a JSON file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist settings as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
