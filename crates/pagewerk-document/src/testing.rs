// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic document photos for tests.

use image::{Rgb, RgbImage};
use pagewerk_core::{Point, Quad};

const BACKGROUND: Rgb<u8> = Rgb([40, 44, 52]);
const PAPER: Rgb<u8> = Rgb([236, 233, 226]);
const INK: Rgb<u8> = Rgb([30, 30, 36]);

/// A light page, optionally with text bars, rotated clockwise by
/// `angle_deg` about the frame centre on a dark table.
pub struct SyntheticPage {
    pub width: u32,
    pub height: u32,
    pub page_w: u32,
    pub page_h: u32,
    pub angle_deg: f32,
    pub text: bool,
}

impl SyntheticPage {
    /// The photo and the true page corners, clockwise from top-left.
    pub fn render(&self) -> (RgbImage, Quad) {
        let (cx, cy) = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        let (sin, cos) = self.angle_deg.to_radians().sin_cos();
        let (half_w, half_h) = (self.page_w as f32 / 2.0, self.page_h as f32 / 2.0);

        let photo = RgbImage::from_fn(self.width, self.height, |x, y| {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            if u.abs() > half_w || v.abs() > half_h {
                return BACKGROUND;
            }
            if self.text && self.is_ink(u + half_w, v + half_h) {
                INK
            } else {
                PAPER
            }
        });

        let corner = |u: f32, v: f32| (cx + u * cos - v * sin, cy + u * sin + v * cos);
        let quad = Quad::from_tuples([
            corner(-half_w, -half_h),
            corner(half_w, -half_h),
            corner(half_w, half_h),
            corner(-half_w, half_h),
        ]);
        (photo, quad)
    }

    /// 3-px text bars every 16 px, broken into words, inside a 20-px margin.
    fn is_ink(&self, px: f32, py: f32) -> bool {
        let margin = 20.0;
        if px < margin || py < margin || px > self.page_w as f32 - margin || py > self.page_h as f32 - margin {
            return false;
        }
        let row = (py - margin) as u32 % 16;
        let col = (px - margin) as u32 % 28;
        row < 3 && col < 20
    }
}

pub fn assert_near(found: &Point, expected: &Point, tolerance: f32) {
    assert!(
        found.distance(expected) <= tolerance,
        "found {found:?}, expected {expected:?} (tolerance {tolerance})"
    );
}
