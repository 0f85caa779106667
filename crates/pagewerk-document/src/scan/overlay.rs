// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Debug overlay — draws the detected quad over the original photo.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use pagewerk_core::Quad;

const OUTLINE: Rgb<u8> = Rgb([0, 220, 90]);
const CORNER: Rgb<u8> = Rgb([255, 60, 40]);
/// Outline thickness in pixels (odd).
const THICKNESS: i32 = 3;

/// RGB copy of `image` with `quad` drawn as a closed polygon and a dot on
/// each corner.
pub fn render_overlay(image: &DynamicImage, quad: &Quad) -> DynamicImage {
    let mut canvas: RgbImage = image.to_rgb8();
    let ordered = quad.ordered();
    let half = THICKNESS / 2;

    for i in 0..4 {
        let a = ordered.points[i];
        let b = ordered.points[(i + 1) % 4];
        for dy in -half..=half {
            for dx in -half..=half {
                let (ox, oy) = (dx as f32, dy as f32);
                draw_line_segment_mut(&mut canvas, (a.x + ox, a.y + oy), (b.x + ox, b.y + oy), OUTLINE);
            }
        }
    }

    let radius = (canvas.width().min(canvas.height()) / 100).max(4) as i32;
    for p in ordered.points {
        draw_filled_circle_mut(&mut canvas, (p.x.round() as i32, p.y.round() as i32), radius, CORNER);
    }
    DynamicImage::ImageRgb8(canvas)
}
