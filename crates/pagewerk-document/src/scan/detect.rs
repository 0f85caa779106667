// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page boundary detection — finds the four corners of a document in a
// hand-held photo.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometry::{approximate_polygon_dp, arc_length, min_area_rect};
use imageproc::point::Point as PixelPoint;
use pagewerk_core::{DetectorConfig, Quad};
use tracing::{debug, instrument, warn};

use crate::image::processor::fit_within;
use crate::scan::filters::{close_square, sigma_for_kernel, threshold_above};

/// Blurred frames whose darkest and brightest pixels differ by less than
/// this are treated as blank.
const MIN_DYNAMIC_RANGE: u8 = 16;

/// Locates the document quadrilateral in a photo.
///
/// ## Pipeline
///
/// 1. Shrink to `max_dimension` on the longer side
/// 2. Grayscale, Gaussian blur, Otsu threshold
/// 3. Morphological close to bridge broken edges
/// 4. Rank outer contours by area, keep those inside the area band
/// 5. Douglas-Peucker each; keep the largest convex 4-gon
/// 6. If nothing qualifies, repeat 4-5 on a closed Canny edge mask
/// 7. Failing that, take the minimum-area rectangle around all foreground
/// 8. Map back to source coordinates and order clockwise from top-left
pub struct QuadDetector<'a> {
    config: &'a DetectorConfig,
}

impl<'a> QuadDetector<'a> {
    pub fn new(config: &'a DetectorConfig) -> Self {
        Self { config }
    }

    /// Detect the page in a decoded photo. `None` means no document was found.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn detect(&self, image: &DynamicImage) -> Option<Quad> {
        self.detect_gray(&image.to_luma8())
    }

    pub fn detect_gray(&self, gray: &GrayImage) -> Option<Quad> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            warn!("Empty image; nothing to detect");
            return None;
        }

        let (working, scale) = fit_within(gray, self.config.max_dimension);
        if !(scale.is_finite() && scale > 0.0) {
            warn!(scale, "Invalid downscale factor");
            return None;
        }
        debug!(
            work_w = working.width(),
            work_h = working.height(),
            scale,
            "Working copy prepared"
        );

        let blurred = gaussian_blur_f32(&working, sigma_for_kernel(self.config.blur_kernel));
        let (lo, hi) = blurred
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        if hi.saturating_sub(lo) < MIN_DYNAMIC_RANGE {
            debug!(lo, hi, "Frame is flat; nothing to detect");
            return None;
        }

        let level = otsu_level(&blurred);
        let mask = close_square(&threshold_above(&blurred, level), self.config.close_kernel);
        debug!(level, "Otsu mask built");

        let found = self.locate(&mask, &blurred);
        let quad = found?.scaled(1.0 / scale).ordered();
        debug!(
            top_left = ?quad.top_left(),
            top_right = ?quad.top_right(),
            bottom_right = ?quad.bottom_right(),
            bottom_left = ?quad.bottom_left(),
            "Document quad detected"
        );
        Some(quad)
    }

    /// Quad in mask coordinates from a binary mask alone: polygon search,
    /// then the minimum-area-rectangle fallback.
    pub fn quad_from_mask(&self, mask: &GrayImage) -> Option<Quad> {
        if is_uninformative(mask) {
            return None;
        }
        self.best_quad(mask).or_else(|| self.min_area_fallback(mask))
    }

    fn locate(&self, otsu_mask: &GrayImage, blurred: &GrayImage) -> Option<Quad> {
        let otsu_usable = !is_uninformative(otsu_mask);
        if otsu_usable {
            if let Some(quad) = self.best_quad(otsu_mask) {
                return Some(quad);
            }
        }

        let edges = close_square(
            &canny(blurred, self.config.canny_low, self.config.canny_high),
            self.config.close_kernel,
        );
        let edges_usable = !is_uninformative(&edges);
        if edges_usable {
            if let Some(quad) = self.best_quad(&edges) {
                debug!("Quad found on edge mask");
                return Some(quad);
            }
        }

        let fallback = if otsu_usable {
            self.min_area_fallback(otsu_mask)
        } else {
            None
        };
        let fallback = fallback.or_else(|| {
            if edges_usable {
                self.min_area_fallback(&edges)
            } else {
                None
            }
        });
        match fallback {
            Some(quad) => {
                debug!(area = quad.area(), "Using minimum-area rectangle fallback");
                Some(quad)
            }
            None => {
                debug!("No document outline found");
                None
            }
        }
    }

    /// Largest convex 4-point approximation among the biggest outer contours.
    fn best_quad(&self, mask: &GrayImage) -> Option<Quad> {
        let total = mask.width() as f64 * mask.height() as f64;
        let min_area = self.config.min_area_ratio as f64 * total;
        let max_area = self.config.max_area_ratio as f64 * total;

        let mut ranked: Vec<(f64, Vec<PixelPoint<i32>>)> = outer_contours(mask)
            .filter(|c| c.points.len() >= 4)
            .map(|c| (polygon_area(&c.points), c.points))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.config.max_candidates);

        let mut best: Option<Quad> = None;
        for (area, points) in ranked {
            if area < min_area || area > max_area {
                continue;
            }
            let perimeter = arc_length(&points, true);
            let epsilon = (self.config.epsilon_factor * perimeter).max(1.0);
            let polygon = simplify_closed(approximate_polygon_dp(&points, epsilon, true), epsilon);
            if polygon.len() != 4 {
                debug!(vertices = polygon.len(), area, "Contour is not a quadrilateral");
                continue;
            }

            let quad = Quad::from_tuples([0, 1, 2, 3].map(|i| {
                (polygon[i].x as f32, polygon[i].y as f32)
            }));
            if !quad.is_convex() {
                debug!(area, "Rejected non-convex quadrilateral");
                continue;
            }
            let quad = quad.ordered();
            if best.is_none_or(|b| quad.area() > b.area()) {
                best = Some(quad);
            }
        }
        best
    }

    /// Minimum-area rectangle around every foreground outline. Rejects
    /// degenerate and near-full-frame rectangles.
    fn min_area_fallback(&self, mask: &GrayImage) -> Option<Quad> {
        let points: Vec<PixelPoint<i32>> =
            outer_contours(mask).flat_map(|c| c.points).collect();
        if points.is_empty() {
            return None;
        }

        let rect = min_area_rect(&points);
        let quad = Quad::from_tuples(rect.map(|p| (p.x as f32, p.y as f32))).ordered();
        let area = quad.area();
        let max_area = self.config.max_area_ratio * mask.width() as f32 * mask.height() as f32;
        if area < 1.0 || area > max_area {
            debug!(area, max_area, "Fallback rectangle rejected");
            return None;
        }
        Some(quad)
    }
}

/// Detect with a one-off detector.
pub fn detect_image(image: &DynamicImage, config: &DetectorConfig) -> Option<Quad> {
    QuadDetector::new(config).detect(image)
}

fn outer_contours(mask: &GrayImage) -> impl Iterator<Item = Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
}

/// A mask that is entirely background or entirely foreground carries no
/// outline.
fn is_uninformative(mask: &GrayImage) -> bool {
    let total = mask.width() as usize * mask.height() as usize;
    let foreground = mask.pixels().filter(|p| p.0[0] > 0).count();
    foreground == 0 || foreground == total
}

/// Shoelace area of a closed pixel outline.
fn polygon_area(points: &[PixelPoint<i32>]) -> f64 {
    let n = points.len();
    let mut acc = 0.0f64;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64;
    }
    acc.abs() / 2.0
}

/// Drop a repeated closing vertex, then repeatedly remove the vertex closest
/// to the line through its neighbours while that distance is under
/// `epsilon`. Douglas-Peucker keeps the contour's start point even when it
/// lies mid-edge; this removes it.
fn simplify_closed(mut polygon: Vec<PixelPoint<i32>>, epsilon: f64) -> Vec<PixelPoint<i32>> {
    if polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    while polygon.len() > 4 {
        let n = polygon.len();
        let (index, distance) = (0..n)
            .map(|i| {
                let prev = polygon[(i + n - 1) % n];
                let next = polygon[(i + 1) % n];
                (i, distance_to_line(polygon[i], prev, next))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, f64::INFINITY));
        if distance >= epsilon {
            break;
        }
        polygon.remove(index);
    }
    polygon
}

fn distance_to_line(p: PixelPoint<i32>, a: PixelPoint<i32>, b: PixelPoint<i32>) -> f64 {
    let (px, py) = (p.x as f64, p.y as f64);
    let (ax, ay) = (a.x as f64, a.y as f64);
    let (bx, by) = (b.x as f64, b.y as f64);
    let length = (bx - ax).hypot(by - ay);
    if length < f64::EPSILON {
        return (px - ax).hypot(py - ay);
    }
    ((bx - ax) * (ay - py) - (ax - px) * (by - ay)).abs() / length
}
