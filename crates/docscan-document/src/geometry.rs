// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quad geometry — validation, canonical corner ordering, area, motion metric,
// averaging and blending. Pure math, no I/O.
//
// Single malformed points or quads never error: they yield sentinel values
// (`false`, `0.0`, `f64::INFINITY`). Only empty collections are rejected.

use std::cmp::Ordering;

use docscan_core::config::StabilityConfig;
use docscan_core::error::{Result, ScanError};
use docscan_core::types::{FrameSize, Point, Quad, QuadVerdict};

/// Two corners whose `x + y` differ by less than this tie for top-left.
pub const ORDER_TIE_EPSILON: f64 = 1e-3;

// -- Validation ---------------------------------------------------------------

pub fn is_valid_point(p: &Point) -> bool {
    p.is_valid()
}

pub fn is_valid_quad(q: &Quad) -> bool {
    q.is_valid()
}

// -- Ordering -----------------------------------------------------------------

/// Put four unordered corners into `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Corners are sorted by angle around their centroid (clockwise on screen,
/// since y grows downwards), then the sequence is rotated so the corner with
/// the smallest `x + y` comes first. Near-ties keep the earlier corner.
pub fn order_points(points: [Point; 4]) -> Quad {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;

    let mut sorted = points;
    // slice::sort_by is stable.
    sorted.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.partial_cmp(&angle_b).unwrap_or(Ordering::Equal)
    });

    let mut start = 0;
    let mut best = sorted[0].x + sorted[0].y;
    for (i, p) in sorted.iter().enumerate().skip(1) {
        let sum = p.x + p.y;
        if sum < best - ORDER_TIE_EPSILON {
            best = sum;
            start = i;
        }
    }
    sorted.rotate_left(start);

    Quad { points: sorted }
}

/// Re-order an existing quad's corners canonically.
pub fn order_quad(quad: &Quad) -> Quad {
    order_points(quad.points)
}

// -- Measures -----------------------------------------------------------------

/// Mean distance between corresponding corners; infinite if either quad is
/// invalid. This is the frame-to-frame motion metric.
pub fn quad_distance(a: &Quad, b: &Quad) -> f64 {
    if !a.is_valid() || !b.is_valid() {
        return f64::INFINITY;
    }
    a.points
        .iter()
        .zip(b.points.iter())
        .map(|(p, q)| p.distance(q))
        .sum::<f64>()
        / 4.0
}

/// Shoelace area (absolute); zero for invalid input.
pub fn quad_area(q: &Quad) -> f64 {
    if !q.is_valid() {
        return 0.0;
    }
    polygon_area(&q.points)
}

/// Shoelace area of an arbitrary closed polygon.
pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        twice += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    twice.abs() / 2.0
}

/// Arithmetic mean of the four corners.
pub fn quad_center(q: &Quad) -> Point {
    let (sx, sy) = q
        .points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / 4.0, sy / 4.0)
}

/// Edge lengths in winding order: top, right, bottom, left.
pub fn quad_edge_lengths(q: &Quad) -> [f64; 4] {
    let p = &q.points;
    [
        p[0].distance(&p[1]),
        p[1].distance(&p[2]),
        p[2].distance(&p[3]),
        p[3].distance(&p[0]),
    ]
}

/// Interior angle at each corner in degrees.
pub fn quad_corner_angles(q: &Quad) -> [f64; 4] {
    let p = &q.points;
    let mut angles = [0.0; 4];
    for (i, angle) in angles.iter_mut().enumerate() {
        let prev = p[(i + 3) % 4];
        let cur = p[i];
        let next = p[(i + 1) % 4];
        let (ax, ay) = (prev.x - cur.x, prev.y - cur.y);
        let (bx, by) = (next.x - cur.x, next.y - cur.y);
        let cross = ax * by - ay * bx;
        let dot = ax * bx + ay * by;
        *angle = cross.abs().atan2(dot).to_degrees();
    }
    angles
}

/// Whether the polygon turns the same way at every vertex.
///
/// Collinear vertices do not break convexity, but a polygon with no turn at
/// all (fully collinear) is not convex.
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Why a quad cannot define a perspective transform, if it cannot.
///
/// Rejects invalid coordinates, coincident corners, any three collinear
/// corners, non-convex shapes, and areas below `min_area`.
pub fn degeneracy(q: &Quad, min_area: f64) -> Option<&'static str> {
    if !q.is_valid() {
        return Some("non-finite or out-of-range corner");
    }
    let p = &q.points;
    for i in 0..4 {
        for j in (i + 1)..4 {
            if p[i].distance(&p[j]) < 1.0 {
                return Some("coincident corners");
            }
        }
    }
    for i in 0..4 {
        let a = p[i];
        let b = p[(i + 1) % 4];
        let c = p[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let scale = a.distance(&b) * a.distance(&c);
        if cross.abs() <= scale * 1e-3 {
            return Some("collinear corners");
        }
    }
    if !is_convex(p) {
        return Some("not convex");
    }
    if quad_area(q) < min_area {
        return Some("area too small");
    }
    None
}

/// Classify a detected quad for the stability tracker and overlay prompts.
pub fn classify_quad(q: &Quad, frame: FrameSize, config: &StabilityConfig) -> QuadVerdict {
    if !frame.is_empty() && quad_area(q) < frame.area() * config.min_area_ratio {
        return QuadVerdict::TooFar;
    }
    let skewed = quad_corner_angles(q)
        .iter()
        .any(|a| (a - 90.0).abs() > config.max_corner_deviation_deg);
    if skewed {
        return QuadVerdict::BadAngle;
    }
    QuadVerdict::Good
}

// -- Averaging / blending -----------------------------------------------------

/// Element-wise mean of a non-empty list of quads.
pub fn average_quad(quads: &[Quad]) -> Result<Quad> {
    weighted_mean(quads, |_| 1.0)
}

/// Mean with linearly increasing weights (1, 2, ..., n) so recent quads
/// dominate.
pub fn weighted_average_quad(quads: &[Quad]) -> Result<Quad> {
    weighted_mean(quads, |i| (i + 1) as f64)
}

fn weighted_mean(quads: &[Quad], weight: impl Fn(usize) -> f64) -> Result<Quad> {
    if quads.is_empty() {
        return Err(ScanError::EmptyInput);
    }
    let mut acc = [Point::default(); 4];
    let mut total = 0.0;
    for (i, quad) in quads.iter().enumerate() {
        let w = weight(i);
        total += w;
        for (sum, p) in acc.iter_mut().zip(quad.points.iter()) {
            sum.x += p.x * w;
            sum.y += p.y * w;
        }
    }
    for p in acc.iter_mut() {
        p.x /= total;
        p.y /= total;
    }
    Ok(Quad { points: acc })
}

/// Per-corner linear interpolation from `base` towards `target`.
pub fn blend_quads(base: &Quad, target: &Quad, alpha: f64) -> Quad {
    if alpha <= 0.0 {
        return *base;
    }
    if alpha >= 1.0 {
        return *target;
    }
    let mut points = base.points;
    for (p, t) in points.iter_mut().zip(target.points.iter()) {
        p.x += (t.x - p.x) * alpha;
        p.y += (t.y - p.y) * alpha;
    }
    Quad { points }
}

// -- Scaling ------------------------------------------------------------------

pub fn scale_coordinates(p: &Point, scale_x: f64, scale_y: f64) -> Point {
    Point::new(p.x * scale_x, p.y * scale_y)
}

/// Scale every corner independently on each axis.
pub fn scale_quad(q: &Quad, scale_x: f64, scale_y: f64) -> Quad {
    Quad {
        points: q.points.map(|p| scale_coordinates(&p, scale_x, scale_y)),
    }
}

/// Map a quad detected against `from` into the pixel space of `to`.
pub fn rescale_quad(q: &Quad, from: FrameSize, to: FrameSize) -> Quad {
    if from.is_empty() {
        return *q;
    }
    scale_quad(
        q,
        to.width as f64 / from.width as f64,
        to.height as f64 / from.height as f64,
    )
}

/// Add per-corner offsets.
pub fn offset_quad(q: &Quad, offsets: &[Point; 4]) -> Quad {
    let mut points = q.points;
    for (p, o) in points.iter_mut().zip(offsets.iter()) {
        p.x += o.x;
        p.y += o.y;
    }
    Quad { points }
}

// -- Tests --------------------------------------------------------------------
