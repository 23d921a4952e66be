// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `docscan detect` — run the detector once over an image file.

use std::path::PathBuf;

use clap::Args;
use docscan_core::ScannerConfig;
use docscan_core::types::{DetectionResult, QuadVerdict};
use docscan_document::geometry::{classify_quad, quad_area};
use docscan_document::{DocumentDetector, ImageProcessor};
use tracing::info;

use crate::CliResult;

#[derive(Debug, Clone, Args)]
pub struct DetectArgs {
    /// Path to the input image.
    #[arg(long)]
    pub image: PathBuf,

    /// Print the detection as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: &DetectArgs, config: &ScannerConfig) -> CliResult<()> {
    let (result, verdict) = detect_file(&args.image, config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result.quad {
        Some(quad) => {
            println!("document found ({}x{} frame)", result.frame.width, result.frame.height);
            for (name, p) in ["top-left", "top-right", "bottom-right", "bottom-left"]
                .iter()
                .zip(quad.points.iter())
            {
                println!("  {name:<13}{:>9.1} {:>9.1}", p.x, p.y);
            }
            println!("  area         {:>9.0} px", quad_area(&quad));
            if let Some(verdict) = verdict {
                println!("  verdict      {verdict:?}");
            }
        }
        None => println!("no document found"),
    }
    Ok(())
}

/// Decode `path` and detect against it.
pub fn detect_file(
    path: &std::path::Path,
    config: &ScannerConfig,
) -> CliResult<(DetectionResult, Option<QuadVerdict>)> {
    info!("Loading image: {}", path.display());
    let image = ImageProcessor::open(path)?.into_dynamic();
    let result = DocumentDetector::new(config.detector.clone()).detect(&image);
    let verdict = result
        .quad
        .as_ref()
        .map(|q| classify_quad(q, result.frame, &config.stability));
    Ok((result, verdict))
}
