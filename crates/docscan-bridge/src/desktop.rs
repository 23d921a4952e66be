// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Desktop bridge — a camera fed from files or memory, and a plain directory
// store. Used by the CLI and by tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use docscan_core::error::{Result, ScanError};
use docscan_core::types::Rotation;
use tracing::{debug, info, instrument};

use crate::traits::*;

/// A "camera" whose next still is whatever was last loaded into it.
#[derive(Debug, Default)]
pub struct FrameCamera {
    still: Mutex<Option<StillImage>>,
}

impl FrameCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera that is ready immediately with `still` loaded.
    pub fn with_still(still: StillImage) -> Self {
        Self {
            still: Mutex::new(Some(still)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<StillImage>> {
        self.still.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the still returned by subsequent captures.
    pub fn load(&self, still: StillImage) {
        *self.slot() = Some(still);
    }

    /// Load an encoded image file as the next still.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn load_file(&self, path: impl AsRef<Path>, rotation: Rotation) -> Result<()> {
        let data = fs::read(path.as_ref())?;
        debug!(bytes = data.len(), "Still loaded from file");
        self.load(StillImage::new(data, rotation));
        Ok(())
    }

    /// Drop the loaded still; the camera reports not-ready afterwards.
    pub fn unload(&self) {
        *self.slot() = None;
    }
}

impl StillCamera for FrameCamera {
    fn is_ready(&self) -> bool {
        self.slot().is_some()
    }

    fn capture_still(&self) -> Result<StillImage> {
        self.slot().clone().ok_or(ScanError::CaptureUnavailable)
    }
}

/// Writes capture files into one directory, creating it on first use.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ImageStore for DirectoryStore {
    fn write_image(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::create_dir_all(&self.root)
            .and_then(|()| fs::write(&path, bytes))
            .map_err(|err| ScanError::FileWriteFailed(format!("{}: {}", path.display(), err)))?;
        info!(path = %path.display(), bytes = bytes.len(), "Capture file written");
        Ok(path)
    }

    fn remove_image(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .map_err(|err| ScanError::FileWriteFailed(format!("{}: {}", path.display(), err)))?;
        debug!(path = %path.display(), "Capture file removed");
        Ok(())
    }
}

/// Desktop bridge: a [`FrameCamera`] paired with a [`DirectoryStore`].
pub struct DesktopBridge {
    pub camera: FrameCamera,
    pub store: DirectoryStore,
}

impl DesktopBridge {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            camera: FrameCamera::new(),
            store: DirectoryStore::new(output_dir),
        }
    }
}

impl PlatformBridge for DesktopBridge {
    fn platform_name(&self) -> &str {
        "Desktop"
    }
}

impl StillCamera for DesktopBridge {
    fn is_ready(&self) -> bool {
        self.camera.is_ready()
    }

    fn capture_still(&self) -> Result<StillImage> {
        self.camera.capture_still()
    }
}

impl ImageStore for DesktopBridge {
    fn write_image(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.store.write_image(name, bytes)
    }

    fn remove_image(&self, path: &Path) -> Result<()> {
        self.store.remove_image(path)
    }
}
