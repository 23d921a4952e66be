// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalisation (CLAHE).
//
// The image is split into a grid of tiles; each tile gets its own clipped,
// equalised lookup table and pixels are bilinearly interpolated between the
// four nearest tile tables so tile seams do not show up as edges.

use image::{GrayImage, Luma};

/// Equalise `gray` with a `tiles x tiles` grid and the given clip limit.
///
/// `clip_limit` is a multiple of the mean bin height (`tile_area / 256`), as
/// in the usual CLAHE formulation; 2.0 is a gentle boost.
pub fn clahe(gray: &GrayImage, tiles: u32, clip_limit: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(tiles.clamp(1, width));
    let tile_h = height.div_ceil(tiles.clamp(1, height));
    // Rounding the tile size up can leave trailing tiles empty; drop them so
    // every tile starts inside the image.
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    let mut output = GrayImage::new(width, height);
    for y in 0..height {
        let (ty0, ty1, wy) = tile_neighbours(y, tile_h, tiles_y);
        for x in 0..width {
            let (tx0, tx1, wx) = tile_neighbours(x, tile_w, tiles_x);
            let v = gray.get_pixel(x, y).0[0] as usize;

            let top = lut_at(tx0, ty0)[v] * (1.0 - wx) + lut_at(tx1, ty0)[v] * wx;
            let bottom = lut_at(tx0, ty1)[v] * (1.0 - wx) + lut_at(tx1, ty1)[v] * wx;
            let value = top * (1.0 - wy) + bottom * wy;

            output.put_pixel(x, y, Luma([value.round().clamp(0.0, 255.0) as u8]));
        }
    }
    output
}

/// The two tile indices whose centres bracket `coord`, and the weight of the
/// second one.
fn tile_neighbours(coord: u32, tile_size: u32, tile_count: u32) -> (u32, u32, f32) {
    let pos = (coord as f32 + 0.5) / tile_size as f32 - 0.5;
    let last = (tile_count - 1) as f32;
    let clamped = pos.clamp(0.0, last);
    let t0 = clamped.floor();
    let t1 = (t0 + 1.0).min(last);
    (t0 as u32, t1 as u32, clamped - t0)
}

/// Clipped-histogram equalisation table for one tile.
fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [f32; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }

    let area = x1.saturating_sub(x0) * y1.saturating_sub(y0);
    let mut lut = [0.0f32; 256];
    if area == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as f32;
        }
        return lut;
    }

    clip_histogram(&mut histogram, clip_limit, area);

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (bin, v) in histogram.iter().zip(lut.iter_mut()) {
        cdf += bin;
        *v = cdf as f32 * scale;
    }
    lut
}

/// Clip every bin at `clip_limit * area / 256` and spread the excess evenly.
fn clip_histogram(histogram: &mut [u32; 256], clip_limit: f32, area: u32) {
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    if excess == 0 {
        return;
    }

    let per_bin = excess / 256;
    let residual = (excess % 256) as usize;
    for bin in histogram.iter_mut() {
        *bin += per_bin;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for bin in histogram.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }
}
