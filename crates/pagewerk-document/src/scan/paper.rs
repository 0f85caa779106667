// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Paper normalizer — matches a detected quad against standard paper sizes.

use pagewerk_core::{PaperConfig, PaperGuess, PaperSize, Quad, Size};
use tracing::debug;

/// Classify the quad's long/short aspect against A4, Letter and Legal, in that
/// order. The first size within `tolerance` (relative) wins.
pub fn guess(quad: &Quad, config: &PaperConfig) -> Option<PaperGuess> {
    let ordered = quad.ordered();
    let width = ordered.measured_width();
    let height = ordered.measured_height();
    let short = width.min(height);
    if !(short >= 1.0) {
        debug!(width, height, "Degenerate quad; no paper guess");
        return None;
    }
    let aspect = width.max(height) / short;

    let paper = PaperSize::ALL.into_iter().find(|paper| {
        let ratio = paper.long_short_ratio();
        (aspect - ratio).abs() / ratio <= config.tolerance
    });
    debug!(aspect, paper = ?paper, "Paper size matched");

    paper.map(|paper| PaperGuess {
        paper,
        dpi: config.dpi,
    })
}

/// Output canvas for `guess`, landscape when the quad is wider than tall.
pub fn target_size(quad: &Quad, guess: &PaperGuess) -> Size {
    guess.canvas_for(quad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f32, h: f32) -> Quad {
        Quad::from_tuples([(10.0, 10.0), (10.0 + w, 10.0), (10.0 + w, 10.0 + h), (10.0, 10.0 + h)])
    }

    #[test]
    fn exact_a4_ratio() {
        let g = guess(&rect(210.0, 297.0), &PaperConfig::default()).unwrap();
        assert_eq!(g.paper, PaperSize::A4);
        assert_eq!(g.dpi, 200);
    }

    #[test]
    fn letter_and_legal() {
        let cfg = PaperConfig {
            tolerance: 0.03,
            ..PaperConfig::default()
        };
        assert_eq!(guess(&rect(850.0, 1100.0), &cfg).unwrap().paper, PaperSize::Letter);
        assert_eq!(guess(&rect(850.0, 1400.0), &cfg).unwrap().paper, PaperSize::Legal);
    }

    #[test]
    fn far_off_ratios_have_no_match() {
        let cfg = PaperConfig::default();
        assert!(guess(&rect(500.0, 500.0), &cfg).is_none());
        assert!(guess(&rect(300.0, 600.0), &cfg).is_none());
    }

    #[test]
    fn degenerate_quad_has_no_match() {
        assert!(guess(&rect(300.0, 0.0), &PaperConfig::default()).is_none());
    }

    #[test]
    fn landscape_quad_gets_landscape_canvas() {
        let quad = rect(297.0, 210.0);
        let g = guess(&quad, &PaperConfig::default()).unwrap();
        assert_eq!(g.paper, PaperSize::A4);
        let size = target_size(&quad, &g);
        assert!(size.width > size.height);
        assert_eq!(size, g.canvas().flipped());
    }

    #[test]
    fn rotated_quad_measures_edges_not_bounds() {
        let (w, h) = (210.0f32, 297.0f32);
        let (s, c) = 0.3f32.sin_cos();
        let corner = |u: f32, v: f32| (400.0 + u * c - v * s, 400.0 + u * s + v * c);
        let quad = Quad::from_tuples([
            corner(-w / 2.0, -h / 2.0),
            corner(w / 2.0, -h / 2.0),
            corner(w / 2.0, h / 2.0),
            corner(-w / 2.0, h / 2.0),
        ]);
        assert_eq!(
            guess(&quad, &PaperConfig::default()).unwrap().paper,
            PaperSize::A4
        );
    }
}
