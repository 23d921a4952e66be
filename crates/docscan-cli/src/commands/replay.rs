// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `docscan replay` — drive a full scanner session from a directory of frames.
//
// Each image is both the preview frame and the still the camera would
// return at that moment, so auto captures rectify the frame that triggered
// them. Detection and capture events are printed as JSON lines.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use docscan_bridge::{DirectoryStore, FrameCamera, StillImage};
use docscan_core::ScannerConfig;
use docscan_core::types::Rotation;
use docscan_document::Frame;
use docscan_document::image::processor::encode_jpeg;
use docscan_scanner::{CaptureEvent, Scanner};
use serde_json::json;
use tracing::{info, warn};

use crate::CliResult;
use crate::services::data_dir;

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Upper bound on one frame's analysis before the replay gives up.
const FRAME_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Directory of frames, replayed in file-name order.
    #[arg(long)]
    pub frames: PathBuf,

    /// Where capture files go (overrides the config).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Take a manual capture after the last frame.
    #[arg(long)]
    pub capture: bool,
}

pub async fn run(args: &ReplayArgs, mut config: ScannerConfig) -> CliResult<()> {
    if let Some(out) = &args.out {
        config.output_dir = Some(out.clone());
    }
    let store = DirectoryStore::new(data_dir::output_dir(&config));
    let camera = Arc::new(FrameCamera::new());
    let quality = config.effective_quality();

    let frames = list_frames(&args.frames)?;
    info!(count = frames.len(), dir = %args.frames.display(), "Replaying frames");

    let (scanner, mut events) = Scanner::new(config, camera.clone(), Arc::new(store))?;

    for path in &frames {
        let image = image::open(path).map_err(|e| -> crate::CliError {
            format!("Failed to open frame {}: {}", path.display(), e).into()
        })?;
        camera.load(StillImage::new(encode_jpeg(&image, quality)?, Rotation::Deg0));

        if !scanner.submit_frame(Frame::new(image, Rotation::Deg0)) {
            warn!(frame = %path.display(), "Frame dropped");
            continue;
        }
        let event = tokio::time::timeout(FRAME_TIMEOUT, events.detections.recv())
            .await?
            .ok_or("scanner stopped unexpectedly")?;
        println!(
            "{}",
            json!({ "frame": path.display().to_string(), "detection": event })
        );

        while let Ok(capture) = events.captures.try_recv() {
            print_capture(&capture)?;
        }
    }

    if args.capture {
        // Reported on the capture channel like any other capture.
        if let Err(err) = scanner.capture().await {
            warn!(error = %err, "Manual capture rejected");
        }
    }

    // The capture channel closes once the session and its capture tasks end.
    drop(scanner);
    while let Some(capture) = events.captures.recv().await {
        print_capture(&capture)?;
    }
    Ok(())
}

fn print_capture(event: &CaptureEvent) -> CliResult<()> {
    println!("{}", serde_json::to_string(&json!({ "capture": event }))?);
    Ok(())
}

/// Image files directly inside `dir`, sorted by name.
fn list_frames(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_frame(path))
        .collect();
    frames.sort();
    if frames.is_empty() {
        return Err(format!("no image frames in {}", dir.display()).into());
    }
    Ok(frames)
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
