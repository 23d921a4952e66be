// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `docscan rectify` — detect and flatten a document in an image file.

use std::path::{Path, PathBuf};

use clap::Args;
use docscan_core::ScannerConfig;
use docscan_document::image::processor::encode_jpeg;
use docscan_document::{DocumentDetector, ImageProcessor, Rectifier};
use image::DynamicImage;
use tracing::{info, warn};

use crate::CliResult;

#[derive(Debug, Clone, Args)]
pub struct RectifyArgs {
    /// Path to the input image.
    #[arg(long)]
    pub image: PathBuf,

    /// Path of the JPEG to write.
    #[arg(long)]
    pub out: PathBuf,

    /// JPEG quality; values below the quality floor are raised to it.
    #[arg(long)]
    pub quality: Option<u8>,
}

pub fn run(args: &RectifyArgs, config: &ScannerConfig) -> CliResult<()> {
    let mut config = config.clone();
    if let Some(quality) = args.quality {
        config.quality = quality.min(100);
    }

    let image = ImageProcessor::open(&args.image)?.into_dynamic();
    let output = rectify_image(&image, &config);
    write_jpeg(&output, &args.out, config.effective_quality())?;

    println!(
        "{} ({}x{})",
        args.out.display(),
        output.width(),
        output.height()
    );
    Ok(())
}

/// The flattened document, or the input unchanged when nothing usable was
/// found.
pub fn rectify_image(image: &DynamicImage, config: &ScannerConfig) -> DynamicImage {
    let detection = DocumentDetector::new(config.detector.clone()).detect(image);
    let Some(quad) = detection.quad else {
        warn!("No document found, writing original");
        return image.clone();
    };
    match Rectifier::default().rectify(image, &quad) {
        Ok(rectified) => rectified,
        Err(err) => {
            warn!(error = %err, "Rectification failed, writing original");
            image.clone()
        }
    }
}

fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> CliResult<()> {
    let bytes = encode_jpeg(image, quality)?;
    std::fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), quality, "JPEG written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn page() -> DynamicImage {
        let mut img = GrayImage::from_pixel(640, 480, Luma([25u8]));
        for y in 100..380 {
            for x in 100..540 {
                img.put_pixel(x, y, Luma([235u8]));
            }
        }
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn document_is_flattened() {
        let out = rectify_image(&page(), &ScannerConfig::default());
        assert!((out.width() as i32 - 440).abs() <= 4, "width {}", out.width());
        assert!((out.height() as i32 - 280).abs() <= 4, "height {}", out.height());
    }

    #[test]
    fn blank_image_is_passed_through() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 48, Luma([90u8])));
        let out = rectify_image(&blank, &ScannerConfig::default());
        assert_eq!((out.width(), out.height()), (64, 48));
    }

    #[test]
    fn writes_jpeg_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.jpg");
        write_jpeg(&page(), &path, 95).expect("write");
        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
