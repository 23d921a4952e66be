// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the native capabilities the
// scanner depends on: a still-capture camera and somewhere to put JPEGs.

use std::path::{Path, PathBuf};

use docscan_core::error::Result;
use docscan_core::types::Rotation;

/// Unified bridge that groups all native capabilities.
///
/// Platforms that lack a capability return
/// `ScanError::PlatformUnavailable` from the stub implementation.
pub trait PlatformBridge: StillCamera + ImageStore {
    /// Human-readable platform name (e.g. "iOS 17", "Desktop").
    fn platform_name(&self) -> &str;
}

/// An encoded full-resolution still plus the rotation that makes it upright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StillImage {
    /// Encoded bytes (JPEG, PNG, ...), exactly as the camera produced them.
    pub data: Vec<u8>,
    pub rotation: Rotation,
}

impl StillImage {
    pub fn new(data: Vec<u8>, rotation: Rotation) -> Self {
        Self { data, rotation }
    }
}

/// Full-resolution still capture.
///
/// Called from a blocking worker, never from the frame callback.
pub trait StillCamera: Send + Sync {
    /// Whether a still can be taken right now (session running, output
    /// attached).
    fn is_ready(&self) -> bool;

    /// Take one still.
    fn capture_still(&self) -> Result<StillImage>;
}

/// Destination for encoded capture files.
pub trait ImageStore: Send + Sync {
    /// Persist `bytes` under `name` and return where they landed.
    fn write_image(&self, name: &str, bytes: &[u8]) -> Result<PathBuf>;

    /// Delete a file previously returned by `write_image`.
    fn remove_image(&self, path: &Path) -> Result<()>;
}
