// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagewerk document pipeline.

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// Opaque reference to an image buffer held by the image store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(pub Uuid);

impl ImageHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Geometry -----------------------------------------------------------------

/// A point in pixel coordinates (x to the right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Pixel dimensions of an image or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The same canvas with width and height swapped.
    pub fn flipped(&self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Long side divided by short side. Zero for an empty size.
    pub fn aspect(&self) -> f32 {
        let long = self.width.max(self.height) as f32;
        let short = self.width.min(self.height) as f32;
        if short == 0.0 { 0.0 } else { long / short }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// Four corners of a document in a photo.
///
/// Detector output is always in clockwise order starting at the top-left
/// corner: `[top_left, top_right, bottom_right, bottom_left]`. Quads built by
/// hand (e.g. from UI corner handles) may be in any order; call
/// [`Quad::ordered`] before relying on corner positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub points: [Point; 4],
}

impl Quad {
    pub const fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Build a quad from `(x, y)` tuples.
    pub fn from_tuples(points: [(f32, f32); 4]) -> Self {
        Self {
            points: points.map(|(x, y)| Point::new(x, y)),
        }
    }

    pub fn top_left(&self) -> Point {
        self.points[0]
    }

    pub fn top_right(&self) -> Point {
        self.points[1]
    }

    pub fn bottom_right(&self) -> Point {
        self.points[2]
    }

    pub fn bottom_left(&self) -> Point {
        self.points[3]
    }

    /// Reorder the corners clockwise, starting at the top-left.
    ///
    /// Uses the sum/difference rule: top-left has the smallest `x + y`,
    /// bottom-right the largest, top-right the largest `x - y`, bottom-left the
    /// smallest. When that rule picks the same point twice (strongly rotated
    /// or irregular quads) the corners are instead sorted by angle around
    /// their centroid and rotated so the smallest `x + y` comes first.
    pub fn ordered(&self) -> Self {
        let pts = &self.points;
        let sum = |p: &Point| p.x + p.y;
        let diff = |p: &Point| p.x - p.y;

        let tl = index_by(pts, |a, b| sum(a) < sum(b));
        let br = index_by(pts, |a, b| sum(a) > sum(b));
        let tr = index_by(pts, |a, b| diff(a) > diff(b));
        let bl = index_by(pts, |a, b| diff(a) < diff(b));

        let mut seen = [false; 4];
        for i in [tl, tr, br, bl] {
            seen[i] = true;
        }
        if seen.iter().all(|s| *s) {
            let candidate = Self::new([pts[tl], pts[tr], pts[br], pts[bl]]);
            if candidate.signed_area() > 0.0 {
                return candidate;
            }
        }

        self.ordered_by_angle()
    }

    fn ordered_by_angle(&self) -> Self {
        let cx = self.points.iter().map(|p| p.x).sum::<f32>() / 4.0;
        let cy = self.points.iter().map(|p| p.y).sum::<f32>() / 4.0;

        // With y pointing down, increasing atan2 sweeps clockwise on screen.
        let mut sorted = self.points;
        sorted.sort_by(|a, b| {
            let ta = (a.y - cy).atan2(a.x - cx);
            let tb = (b.y - cy).atan2(b.x - cx);
            ta.total_cmp(&tb)
        });

        let start = index_by(&sorted, |a, b| a.x + a.y < b.x + b.y);
        sorted.rotate_left(start);
        Self::new(sorted)
    }

    /// Signed shoelace area. Positive when the corners run clockwise on
    /// screen (y down).
    pub fn signed_area(&self) -> f32 {
        let mut acc = 0.0f32;
        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        acc / 2.0
    }

    /// Unsigned polygon area in square pixels.
    pub fn area(&self) -> f32 {
        self.signed_area().abs()
    }

    /// True when the corners, in their current order, form a strictly
    /// convex polygon.
    pub fn is_convex(&self) -> bool {
        let mut sign = 0.0f32;
        for i in 0..4 {
            let a = self.points[i];
            let b = self.points[(i + 1) % 4];
            let c = self.points[(i + 2) % 4];
            let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
            if cross.abs() < f32::EPSILON {
                return false;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }

    /// Clockwise-ordered, convex, and enclosing at least one square pixel.
    pub fn is_well_formed(&self) -> bool {
        let ordered = self.ordered();
        ordered.is_convex() && ordered.area() >= 1.0
    }

    pub fn top_width(&self) -> f32 {
        self.points[0].distance(&self.points[1])
    }

    pub fn bottom_width(&self) -> f32 {
        self.points[3].distance(&self.points[2])
    }

    pub fn left_height(&self) -> f32 {
        self.points[0].distance(&self.points[3])
    }

    pub fn right_height(&self) -> f32 {
        self.points[1].distance(&self.points[2])
    }

    /// Longer of the top and bottom edges.
    pub fn measured_width(&self) -> f32 {
        self.top_width().max(self.bottom_width())
    }

    /// Longer of the left and right edges.
    pub fn measured_height(&self) -> f32 {
        self.left_height().max(self.right_height())
    }

    /// Multiply every coordinate by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.points.map(|p| Point::new(p.x * factor, p.y * factor)))
    }
}

/// Index of the point that wins every pairwise `better` comparison.
fn index_by(points: &[Point; 4], better: impl Fn(&Point, &Point) -> bool) -> usize {
    let mut best = 0;
    for i in 1..4 {
        if better(&points[i], &points[best]) {
            best = i;
        }
    }
    best
}

// -- Paper --------------------------------------------------------------------

/// Standard paper sizes recognised by the paper normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    Letter,
    Legal,
}

impl PaperSize {
    /// Candidates in matching priority order.
    pub const ALL: [PaperSize; 3] = [PaperSize::A4, PaperSize::Letter, PaperSize::Legal];

    /// Portrait dimensions in millimetres (width, height).
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A4 => (210.0, 297.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
        }
    }

    /// Long side over short side.
    pub fn long_short_ratio(&self) -> f32 {
        match self {
            Self::A4 => 297.0 / 210.0,
            Self::Letter => 11.0 / 8.5,
            Self::Legal => 14.0 / 8.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        }
    }
}

impl std::fmt::Display for PaperSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A paper label matched from a quad's aspect ratio, plus the DPI the page
/// should be rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperGuess {
    pub paper: PaperSize,
    pub dpi: u32,
}

impl PaperGuess {
    /// Portrait canvas in pixels at the guessed DPI.
    pub fn canvas(&self) -> Size {
        let (w_mm, h_mm) = self.paper.dimensions_mm();
        let px = |mm: f32| ((mm / 25.4 * self.dpi as f32).round() as u32).max(1);
        Size::new(px(w_mm), px(h_mm))
    }

    /// Canvas oriented like `quad`: flipped to landscape (not rotated) when
    /// the quad is wider than it is tall.
    pub fn canvas_for(&self, quad: &Quad) -> Size {
        let ordered = quad.ordered();
        let canvas = self.canvas();
        if ordered.measured_width() > ordered.measured_height() {
            canvas.flipped()
        } else {
            canvas
        }
    }
}

// -- Presets ------------------------------------------------------------------

/// Enhancement pipelines selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Flattened lighting, mild CLAHE, unsharp mask, gamma. Grayscale output.
    AutoPro,
    /// Lighting flattened on luminance only; chrominance untouched.
    ColorPro,
    /// Flattened lighting then adaptive Gaussian threshold. Binary output.
    BwPro,
    /// Legacy: denoise, CLAHE, unsharp mask.
    ColorClean,
    /// Legacy: illumination normalisation and local-mean threshold.
    Bw,
    /// Grayscale plus CLAHE. Used for any unrecognised name.
    Minimal,
}

impl Preset {
    /// Parse a wire name. Unknown names fall back to [`Preset::Minimal`].
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto_pro" => Self::AutoPro,
            "color_pro" => Self::ColorPro,
            "bw_pro" => Self::BwPro,
            "color" | "clean" | "color_clean" => Self::ColorClean,
            "bw" => Self::Bw,
            "minimal" => Self::Minimal,
            other => {
                warn!(preset = other, "Unknown enhancement preset; using minimal");
                Self::Minimal
            }
        }
    }

    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AutoPro => "auto_pro",
            Self::ColorPro => "color_pro",
            Self::BwPro => "bw_pro",
            Self::ColorClean => "color",
            Self::Bw => "bw",
            Self::Minimal => "minimal",
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// -- Output -------------------------------------------------------------------

/// Encoded output formats produced by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Jpeg { quality: u8 },
    Png,
}

impl OutputFormat {
    /// JPEG at `quality`, clamped to 1-100.
    pub fn jpeg(quality: u8) -> Self {
        Self::Jpeg {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "jpg",
            Self::Png => "png",
        }
    }
}

/// Per-call options supplied by the capture/session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Enhancement preset name (`auto_pro`, `color_pro`, `bw_pro`, `color`, `bw`).
    pub preset: String,
    /// JPEG quality for the finished page (1-100).
    pub output_quality: u8,
    /// Emit PNG instead of JPEG for the finished page.
    pub lossless_output: bool,
    /// Also render the detected quad over the original photo.
    pub include_overlay: bool,
    /// JPEG quality for the overlay; `None` encodes it as PNG.
    pub overlay_quality: Option<u8>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            preset: Preset::AutoPro.name().to_string(),
            output_quality: 85,
            lossless_output: false,
            include_overlay: false,
            overlay_quality: None,
        }
    }
}

impl ScanOptions {
    pub fn output_format(&self) -> OutputFormat {
        if self.lossless_output {
            OutputFormat::Png
        } else {
            OutputFormat::jpeg(self.output_quality)
        }
    }

    pub fn overlay_format(&self) -> OutputFormat {
        match self.overlay_quality {
            Some(quality) => OutputFormat::jpeg(quality),
            None => OutputFormat::Png,
        }
    }
}

/// A finished page.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Encoded enhanced page.
    pub output_bytes: Vec<u8>,
    /// Detected (or supplied) corners in source-image coordinates.
    pub quad: Quad,
    /// Matched paper size, if any.
    pub paper_label: Option<PaperSize>,
    /// Pixel size of the rectified page.
    pub output_size: Size,
    /// Preset that was actually applied.
    pub preset: Preset,
    /// Encoded debug overlay, when requested.
    pub overlay_bytes: Option<Vec<u8>>,
}
