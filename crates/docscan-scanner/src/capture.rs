// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Capture pipeline — the single-flight capture slot and the blocking work of
// turning a full-resolution still into original + cropped JPEG outputs.

use std::sync::atomic::{AtomicU8, Ordering};

use base64::{Engine as _, engine::general_purpose};
use chrono::Utc;
use docscan_bridge::{ImageStore, StillImage};
use docscan_core::config::{CornerCalibration, ScannerConfig};
use docscan_core::error::{Result, ScanError};
use docscan_core::types::{
    CaptureResult, CaptureState, DetectionResult, FrameSize, ImagePayload, Quad,
};
use docscan_document::geometry::{offset_quad, rescale_quad};
use docscan_document::image::processor::encode_jpeg;
use docscan_document::{ImageProcessor, Rectifier};
use image::DynamicImage;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Single-flight slot
// ---------------------------------------------------------------------------

/// Atomic Idle/Capturing state machine. At most one capture holds the slot.
#[derive(Debug)]
pub struct CaptureSlot {
    state: AtomicU8,
}

impl Default for CaptureSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSlot {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CaptureState::Idle as u8),
        }
    }

    pub fn state(&self) -> CaptureState {
        CaptureState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move Idle -> Capturing, or fail immediately with `CaptureInProgress`.
    /// The slot returns to Idle when the guard drops, whatever the outcome.
    pub fn try_begin(&self) -> Result<CaptureGuard<'_>> {
        self.state
            .compare_exchange(
                CaptureState::Idle as u8,
                CaptureState::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| ScanError::CaptureInProgress)?;
        Ok(CaptureGuard { slot: self })
    }
}

/// Holds the capture slot; releases it on drop.
#[derive(Debug)]
pub struct CaptureGuard<'a> {
    slot: &'a CaptureSlot,
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.slot
            .state
            .store(CaptureState::Idle as u8, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Still processing
// ---------------------------------------------------------------------------

/// Map a quad detected on a preview frame into the pixel space of the
/// captured still, then apply per-corner calibration.
pub fn quad_for_capture(
    quad: &Quad,
    detected_on: FrameSize,
    capture: FrameSize,
    calibration: &CornerCalibration,
) -> Quad {
    let scaled = rescale_quad(quad, detected_on, capture);
    if calibration.is_identity() {
        scaled
    } else {
        offset_quad(&scaled, &calibration.offsets())
    }
}

/// Decode, rectify, encode and store one still.
///
/// `detection` is a snapshot of the latest detection taken when the capture
/// started. Without a usable quad, or when rectification refuses the quad,
/// the cropped output is a copy of the original.
#[instrument(skip_all, fields(bytes = still.data.len(), base64 = config.use_base64))]
pub fn process_capture(
    still: &StillImage,
    detection: Option<DetectionResult>,
    config: &ScannerConfig,
    store: &dyn ImageStore,
) -> Result<CaptureResult> {
    let id = Uuid::new_v4();
    let captured_at = Utc::now();

    let original = ImageProcessor::from_bytes(&still.data)
        .map_err(|err| ScanError::ImageCreationFailed(err.to_string()))?
        .rotate(still.rotation)
        .into_dynamic();
    let size = FrameSize::new(original.width(), original.height());
    debug!(width = size.width, height = size.height, "Still decoded");

    let candidate = detection.and_then(|d| {
        d.quad
            .map(|q| quad_for_capture(&q, d.frame, size, &config.corner_offsets))
    });
    let rectified = match candidate {
        Some(quad) => rectify_or_fallback(&original, quad)?,
        None => {
            debug!("No document quad at capture time, keeping original");
            None
        }
    };

    let quality = config.effective_quality();
    let original_jpeg = encode_jpeg(&original, quality)?;
    let (cropped_jpeg, cropped_size, quad) = match &rectified {
        Some((image, quad)) => (
            encode_jpeg(image, quality)?,
            FrameSize::new(image.width(), image.height()),
            Some(*quad),
        ),
        None => (original_jpeg.clone(), size, None),
    };

    let original = payload(config, store, &format!("{id}-original.jpg"), &original_jpeg)?;
    let cropped = match payload(config, store, &format!("{id}-cropped.jpg"), &cropped_jpeg) {
        Ok(cropped) => cropped,
        Err(err) => {
            discard(store, &original);
            return Err(err);
        }
    };

    info!(
        %id,
        width = size.width,
        height = size.height,
        cropped_width = cropped_size.width,
        cropped_height = cropped_size.height,
        quality,
        "Capture processed"
    );

    Ok(CaptureResult {
        id,
        original,
        cropped,
        width: size.width,
        height: size.height,
        cropped_width: cropped_size.width,
        cropped_height: cropped_size.height,
        quad,
        captured_at,
    })
}

/// Rectified image plus the quad it was cut with, or `None` when the quad is
/// unusable. Only non-recoverable errors propagate.
fn rectify_or_fallback(image: &DynamicImage, quad: Quad) -> Result<Option<(DynamicImage, Quad)>> {
    match Rectifier::default().rectify(image, &quad) {
        Ok(rectified) => Ok(Some((rectified, quad))),
        Err(err) if err.is_recoverable() => {
            warn!(error = %err, "Rectification failed, falling back to original");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn payload(
    config: &ScannerConfig,
    store: &dyn ImageStore,
    name: &str,
    jpeg: &[u8],
) -> Result<ImagePayload> {
    if config.use_base64 {
        return Ok(ImagePayload::Base64(general_purpose::STANDARD.encode(jpeg)));
    }
    let path = store.write_image(name, jpeg).map_err(|err| match err {
        ScanError::FileWriteFailed(_) => err,
        other => ScanError::FileWriteFailed(format!("{name}: {other}")),
    })?;
    Ok(ImagePayload::File(path))
}

/// Remove a file written earlier in a capture that then failed.
fn discard(store: &dyn ImageStore, payload: &ImagePayload) {
    if let ImagePayload::File(path) = payload {
        match store.remove_image(path) {
            Ok(()) => debug!(path = %path.display(), "Removed orphaned capture file"),
            Err(err) => warn!(
                error = %err,
                path = %path.display(),
                "Could not remove orphaned capture file"
            ),
        }
    }
}

// -- Tests --------------------------------------------------------------------
