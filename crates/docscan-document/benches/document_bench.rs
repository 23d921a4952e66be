// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the docscan-document crate. Covers the per-frame
// detection pipeline (the hot path while the preview is running) and the
// one-shot rectification of a captured still.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, GrayImage, Luma};

use docscan_core::config::DetectorConfig;
use docscan_core::types::Quad;
use docscan_document::{DocumentDetector, Rectifier};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Dark background with a bright document from (100, 100) to (540, 380).
fn preview_frame() -> DynamicImage {
    let mut img = GrayImage::from_pixel(640, 480, Luma([25u8]));
    for y in 100..380 {
        for x in 100..540 {
            img.put_pixel(x, y, Luma([235u8]));
        }
    }
    DynamicImage::ImageLuma8(img)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full detection on a VGA preview frame.
fn bench_detect(c: &mut Criterion) {
    let frame = preview_frame();
    let detector = DocumentDetector::default();

    c.bench_function("detect (640x480)", |b| {
        b.iter(|| black_box(detector.detect(black_box(&frame))));
    });

    let downscaled = DocumentDetector::new(DetectorConfig {
        max_analysis_dimension: Some(320),
        ..DetectorConfig::default()
    });
    c.bench_function("detect (640x480, analysed at 320)", |b| {
        b.iter(|| black_box(downscaled.detect(black_box(&frame))));
    });
}

/// Rectification of the document region into a 440x280 output.
fn bench_rectify(c: &mut Criterion) {
    let frame = preview_frame();
    let quad = Quad::rect(100.0, 100.0, 540.0, 380.0);
    let rectifier = Rectifier::default();

    c.bench_function("rectify (440x280)", |b| {
        b.iter(|| black_box(rectifier.rectify(black_box(&frame), &quad)));
    });
}

criterion_group!(benches, bench_detect, bench_rectify);
criterion_main!(benches);
