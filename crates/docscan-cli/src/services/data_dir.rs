// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution and config loading.

use std::path::{Path, PathBuf};

use docscan_core::ScannerConfig;
use docscan_core::error::Result;
use tracing::debug;

const APP_DIR: &str = "docscan";
const CONFIG_FILE: &str = "config.json";

/// Return the application data directory, creating it if needed.
pub fn data_dir() -> PathBuf {
    let dir = dirs_fallback().join(APP_DIR);
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Return a subdirectory inside the data dir (e.g. "captures").
pub fn data_subdir(name: &str) -> PathBuf {
    let dir = data_dir().join(name);
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Where `docscan config` writes and other commands look by default.
pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE)
}

/// Load an explicit config file, or the default one if present.
///
/// Any file loaded is validated; a missing default file yields defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<ScannerConfig> {
    let path = explicit.map_or_else(default_config_path, Path::to_path_buf);
    debug!(path = %path.display(), "Loading scanner config");
    if explicit.is_some() && !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("config file {} not found", path.display()),
        )
        .into());
    }
    ScannerConfig::load(&path)
}

/// Directory replay captures are written to when none is configured.
pub fn output_dir(config: &ScannerConfig) -> PathBuf {
    config
        .output_dir
        .clone()
        .unwrap_or_else(|| data_subdir("captures"))
}

fn dirs_fallback() -> PathBuf {
    // Try XDG data dir, then fallback to home
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.json");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn explicit_config_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"detection_count_before_capture": 3}"#).expect("write");
        let config = load_config(Some(&path)).expect("load");
        assert_eq!(config.detection_count_before_capture, 3);
    }

    #[test]
    fn configured_output_dir_wins() {
        let config = ScannerConfig {
            output_dir: Some(PathBuf::from("/srv/scans")),
            ..ScannerConfig::default()
        };
        assert_eq!(output_dir(&config), PathBuf::from("/srv/scans"));
    }
}
