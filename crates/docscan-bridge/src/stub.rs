// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where no native camera is attached.
//
// Every trait method returns `PlatformUnavailable`.

use std::path::{Path, PathBuf};

use docscan_core::error::{Result, ScanError};

use crate::traits::*;

/// No-op bridge returned on platforms without a native camera.
pub struct StubBridge;

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl StillCamera for StubBridge {
    fn is_ready(&self) -> bool {
        false
    }

    fn capture_still(&self) -> Result<StillImage> {
        tracing::warn!("StillCamera::capture_still called on stub bridge");
        Err(ScanError::PlatformUnavailable)
    }
}

impl ImageStore for StubBridge {
    fn write_image(&self, _name: &str, _bytes: &[u8]) -> Result<PathBuf> {
        tracing::warn!("ImageStore::write_image called on stub bridge");
        Err(ScanError::PlatformUnavailable)
    }

    fn remove_image(&self, _path: &Path) -> Result<()> {
        tracing::warn!("ImageStore::remove_image called on stub bridge");
        Err(ScanError::PlatformUnavailable)
    }
}
