// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document quadrilateral detection — grayscale, CLAHE, blur, Canny, closing,
// external contours, polygon approximation, and candidate filtering.

use docscan_core::config::DetectorConfig;
use docscan_core::types::{DetectionResult, FrameSize, Point, Quad};
use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, find_contours};
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::arc_length;
use imageproc::morphology::close;
use imageproc::point::Point as PixelPoint;
use tracing::{debug, instrument, trace};

use crate::geometry::{is_convex, order_points, polygon_area, rescale_quad};
use crate::image::frame::Frame;
use crate::image::processor::ImageProcessor;
use crate::scan::clahe::clahe;

/// A quadrilateral that survived every filter, with its area in analysis pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub quad: Quad,
    pub area: f64,
}

/// Finds the most prominent document-shaped quadrilateral in a frame.
///
/// "Nothing found" is the common case and is reported as a `None` quad, never
/// as an error. All intermediate buffers are owned by the pipeline stages and
/// released as soon as the next stage no longer needs them.
#[derive(Debug, Clone, Default)]
pub struct DocumentDetector {
    config: DetectorConfig,
}

impl DocumentDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect in a preview frame, after rotating it upright.
    pub fn detect_frame(&self, frame: &Frame) -> DetectionResult {
        self.detect(&frame.upright())
    }

    /// Detect in an upright image. The quad is in the image's pixel space.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> DetectionResult {
        let frame = FrameSize::new(image.width(), image.height());
        if frame.is_empty() {
            return DetectionResult::none(frame);
        }

        let quad = match self.config.max_analysis_dimension {
            Some(limit) if frame.width.max(frame.height) > limit => {
                let small = ImageProcessor::from_dynamic(image.clone())
                    .fit_within(limit)
                    .into_dynamic();
                let analysed = FrameSize::new(small.width(), small.height());
                let gray = small.to_luma8();
                drop(small);
                self.best_candidate(gray)
                    .map(|c| rescale_quad(&c.quad, analysed, frame))
            }
            _ => self.best_candidate(image.to_luma8()).map(|c| c.quad),
        };

        match &quad {
            Some(q) => debug!(quad = ?q.points, "Document quad detected"),
            None => trace!("No document quad in frame"),
        }
        DetectionResult::new(quad, frame)
    }

    /// The largest surviving candidate, corners in canonical order.
    pub fn best_candidate(&self, gray: GrayImage) -> Option<Candidate> {
        self.candidates(gray)
            .into_iter()
            .max_by(|a, b| a.area.total_cmp(&b.area))
    }

    /// Every quadrilateral passing the shape and area filters.
    pub fn candidates(&self, gray: GrayImage) -> Vec<Candidate> {
        let edges = self.edge_map(gray);
        let (width, height) = edges.dimensions();
        let frame_area = width as f64 * height as f64;
        let min_area = (frame_area * self.config.min_area_ratio).max(self.config.min_area_px);
        let max_area = frame_area * self.config.max_area_ratio;

        let contours = find_contours::<i32>(&edges);
        drop(edges);

        let mut survivors = Vec::new();
        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            if contour.points.len() < 4 {
                continue;
            }
            let perimeter = arc_length(&contour.points, true);
            let epsilon = self.config.approx_epsilon_ratio * perimeter;
            let polygon = approximate_closed_polygon(&contour.points, epsilon);
            if polygon.len() != 4 {
                continue;
            }
            if !is_convex(&polygon) {
                trace!("Rejected non-convex quadrilateral");
                continue;
            }
            let area = polygon_area(&polygon);
            if area < min_area || area > max_area {
                trace!(area, min_area, max_area, "Rejected quadrilateral by area");
                continue;
            }
            let quad = order_points([polygon[0], polygon[1], polygon[2], polygon[3]]);
            survivors.push(Candidate { quad, area });
        }

        debug!(
            contours = contours.len(),
            candidates = survivors.len(),
            "Contour analysis complete"
        );
        survivors
    }

    /// Grayscale in, closed binary edge map out.
    pub fn edge_map(&self, gray: GrayImage) -> GrayImage {
        let c = &self.config;
        let equalised = clahe(&gray, c.clahe_tiles, c.clahe_clip_limit);
        drop(gray);
        let blurred = gaussian_blur_f32(&equalised, c.blur_sigma);
        drop(equalised);
        let edges = canny(&blurred, c.canny_low, c.canny_high);
        drop(blurred);
        if c.close_radius == 0 {
            edges
        } else {
            close(&edges, Norm::LInf, c.close_radius)
        }
    }
}

// -- Polygon approximation ----------------------------------------------------

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at the point farthest from its first point, each
/// half is simplified as an open chain, and the halves are rejoined. The
/// result has no repeated closing vertex.
pub fn approximate_closed_polygon(contour: &[PixelPoint<i32>], epsilon: f64) -> Vec<Point> {
    let points: Vec<Point> = contour
        .iter()
        .map(|p| Point::new(p.x as f64, p.y as f64))
        .collect();
    if points.len() < 3 {
        return points;
    }

    let origin = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| origin.distance(a).total_cmp(&origin.distance(b)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![origin];
    }

    let mut first_half = points[..=far].to_vec();
    let mut second_half = points[far..].to_vec();
    second_half.push(origin);

    first_half = simplify_open(&first_half, epsilon);
    second_half = simplify_open(&second_half, epsilon);

    // Both halves share their endpoints; drop the duplicates.
    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half
}

/// Douglas-Peucker on an open chain; keeps both endpoints.
fn simplify_open(chain: &[Point], epsilon: f64) -> Vec<Point> {
    if chain.len() < 3 {
        return chain.to_vec();
    }
    let mut keep = vec![false; chain.len()];
    keep[0] = true;
    keep[chain.len() - 1] = true;

    let mut stack = vec![(0usize, chain.len() - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (chain[start], chain[end]);
        let mut max_dist = 0.0;
        let mut index = start;
        for (i, p) in chain.iter().enumerate().take(end).skip(start + 1) {
            let d = segment_distance(p, &a, &b);
            if d > max_dist {
                max_dist = d;
                index = i;
            }
        }
        if max_dist > epsilon {
            keep[index] = true;
            stack.push((start, index));
            stack.push((index, end));
        }
    }

    chain
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Distance from `p` to the line through `a` and `b` (or to `a` if they coincide).
fn segment_distance(p: &Point, a: &Point, b: &Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len = dx.hypot(dy);
    if len == 0.0 {
        return p.distance(a);
    }
    ((p.x - a.x) * dy - (p.y - a.y) * dx).abs() / len
}

// -- Tests --------------------------------------------------------------------
