// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docscan.

use thiserror::Error;

/// Top-level error type for all docscan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Geometry --
    #[error("empty input: at least one quad is required")]
    EmptyInput,

    #[error("degenerate quad: {0}")]
    DegenerateQuad(String),

    // -- Capture --
    #[error("a capture is already in progress")]
    CaptureInProgress,

    #[error("capture pipeline is not ready")]
    CaptureUnavailable,

    #[error("failed to create image: {0}")]
    ImageCreationFailed(String),

    #[error("failed to write image file: {0}")]
    FileWriteFailed(String),

    // -- Frames / images --
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform bridge --
    #[error("feature not available on this platform")]
    PlatformUnavailable,
}

impl ScanError {
    /// Whether the orchestrator can recover from this error by falling back
    /// (uncropped output, skipped frame) instead of failing the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DegenerateQuad(_) | Self::InvalidFrame(_) | Self::CaptureInProgress => true,
            Self::EmptyInput
            | Self::CaptureUnavailable
            | Self::ImageCreationFailed(_)
            | Self::FileWriteFailed(_)
            | Self::ImageDecode(_)
            | Self::InvalidConfig(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::PlatformUnavailable => false,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectifier_and_contention_errors_are_recoverable() {
        assert!(ScanError::DegenerateQuad("collinear".into()).is_recoverable());
        assert!(ScanError::CaptureInProgress.is_recoverable());
        assert!(!ScanError::FileWriteFailed("disk full".into()).is_recoverable());
        assert!(!ScanError::EmptyInput.is_recoverable());
    }

    #[test]
    fn io_errors_convert() {
        let err: ScanError = std::io::Error::other("boom").into();
        assert!(matches!(err, ScanError::Io(_)));
        assert!(err.to_string().contains("boom"));
    }
}
