// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — maps an ordered document quad onto an
// axis-aligned rectangle through a four-point homography.

use docscan_core::error::{Result, ScanError};
use docscan_core::types::{FrameSize, Quad};
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use tracing::{debug, info, instrument, warn};

use crate::geometry::{degeneracy, quad_edge_lengths};

/// Quads smaller than this (in square pixels) are refused.
pub const MIN_RECTIFY_AREA: f64 = 16.0;

/// Output edges may be at most this multiple of the source's longer side.
/// A quad inside the image never needs more than its diagonal.
pub const MAX_OUTPUT_SCALE: u32 = 2;

/// Output canvas selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputSize {
    /// Derive from the quad's edge lengths, preserving its aspect ratio.
    #[default]
    Auto,
    Fixed(FrameSize),
}

/// Flattens a document quad into a rectangular image.
#[derive(Debug, Clone)]
pub struct Rectifier {
    output: OutputSize,
    /// Fill for destination pixels that map outside the source.
    background: Rgb<u8>,
}

impl Default for Rectifier {
    fn default() -> Self {
        Self {
            output: OutputSize::Auto,
            background: Rgb([255, 255, 255]),
        }
    }
}

impl Rectifier {
    pub fn new(output: OutputSize) -> Self {
        Self {
            output,
            ..Self::default()
        }
    }

    /// Output size for `quad` under this rectifier's policy.
    pub fn output_size(&self, quad: &Quad) -> FrameSize {
        match self.output {
            OutputSize::Fixed(size) => FrameSize::new(size.width.max(1), size.height.max(1)),
            OutputSize::Auto => auto_output_size(quad),
        }
    }

    /// Warp `image` so that `quad` (in the image's pixel coordinates, canonical
    /// order) fills the output rectangle.
    ///
    /// Fails with `DegenerateQuad` when the quad cannot define a usable
    /// transform; callers fall back to the uncropped original.
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn rectify(&self, image: &DynamicImage, quad: &Quad) -> Result<DynamicImage> {
        if let Some(reason) = degeneracy(quad, MIN_RECTIFY_AREA) {
            warn!(reason, "Refusing to rectify degenerate quad");
            return Err(ScanError::DegenerateQuad(reason.to_string()));
        }

        let size = self.output_size(quad);
        let limit = image.width().max(image.height()).saturating_mul(MAX_OUTPUT_SCALE);
        if size.width > limit || size.height > limit {
            warn!(out_w = size.width, out_h = size.height, limit, "Refusing oversized rectification");
            return Err(ScanError::DegenerateQuad(format!(
                "output {}x{} exceeds {limit}px for a {}x{} source",
                size.width,
                size.height,
                image.width(),
                image.height()
            )));
        }
        let projection = homography(quad, size)?;
        debug!(out_w = size.width, out_h = size.height, "Homography computed");

        let source = image.to_rgb8();
        let mut output = RgbImage::new(size.width, size.height);
        warp_into(
            &source,
            &projection,
            Interpolation::Bilinear,
            self.background,
            &mut output,
        );

        info!(out_w = size.width, out_h = size.height, "Perspective correction applied");
        Ok(DynamicImage::ImageRgb8(output))
    }
}

/// `max(top, bottom)` by `max(left, right)`, rounded, at least one pixel.
pub fn auto_output_size(quad: &Quad) -> FrameSize {
    let [top, right, bottom, left] = quad_edge_lengths(quad);
    let width = top.max(bottom);
    let height = right.max(left);
    FrameSize::new(to_pixels(width), to_pixels(height))
}

fn to_pixels(length: f64) -> u32 {
    if length.is_finite() {
        length.round().clamp(1.0, u32::MAX as f64) as u32
    } else {
        1
    }
}

/// Exact four-point homography taking `quad` onto the destination rectangle
/// `[(0,0), (w-1,0), (w-1,h-1), (0,h-1)]`, paired corner for corner.
pub fn homography(quad: &Quad, size: FrameSize) -> Result<Projection> {
    let w = (size.width.max(1) - 1) as f32;
    let h = (size.height.max(1) - 1) as f32;
    let dest = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
    let src = quad.points.map(|p| (p.x as f32, p.y as f32));

    Projection::from_control_points(src, dest)
        .ok_or_else(|| ScanError::DegenerateQuad("no projective transform through corners".into()))
}

// -- Tests --------------------------------------------------------------------
