// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan orchestrator — photo bytes in, finished page bytes out.
//
// decode → detect → guess paper → rectify → enhance → encode (+ overlay).
// Every intermediate buffer is held by a `ScopedHandle`, so the store is
// left as it was found whether the call succeeds or fails.

use std::sync::Arc;
use std::time::Instant;

use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::{
    ImageHandle, PaperGuess, Preset, Quad, ScanConfig, ScanOptions, ScanResult, Size,
};
use tracing::{debug, info, instrument, warn};

use crate::backend::ImagingBackend;
use crate::scan::detect::QuadDetector;
use crate::scan::enhance::ScanEnhancer;
use crate::scan::rectify::rectify_image;
use crate::scan::{overlay, paper};
use crate::store::{ImageStore, ScopedHandle};

/// How far, as a fraction of the frame's width or height, a manual corner may
/// sit outside the photo.
const MANUAL_QUAD_MARGIN: f32 = 0.1;

/// One configured scanning pipeline backed by an [`ImageStore`].
///
/// Pipelines are cheap; several may share a store via [`ScanPipeline::with_store`].
pub struct ScanPipeline {
    store: Arc<ImageStore>,
    config: ScanConfig,
}

impl ScanPipeline {
    /// Create a pipeline with its own store. Fails with `InvalidConfig` if
    /// `config` does not validate.
    pub fn new(config: ScanConfig) -> Result<Self> {
        Self::with_store(config, ImageStore::shared())
    }

    pub fn with_store(config: ScanConfig, store: Arc<ImageStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn shared_store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Turn a photo into a finished page.
    pub fn process_image(&self, bytes: &[u8], options: &ScanOptions) -> Result<ScanResult> {
        process_with(self, bytes, options)
    }

    /// Detection only, for live previews.
    #[instrument(skip_all, fields(bytes_len = bytes.len()))]
    pub fn detect_only(&self, bytes: &[u8]) -> Result<Option<Quad>> {
        let source = self.scoped(self.decode(bytes)?);
        self.detect(source.handle())
    }

    /// Finish a page with caller-supplied corners (manual adjustment),
    /// skipping detection. Corners more than a tenth of the frame outside
    /// the photo are refused with `DegenerateQuad`.
    #[instrument(skip_all, fields(bytes_len = bytes.len(), preset = %options.preset))]
    pub fn process_with_quad(
        &self,
        bytes: &[u8],
        quad: &Quad,
        options: &ScanOptions,
    ) -> Result<ScanResult> {
        if !quad.is_well_formed() {
            warn!(quad = ?quad, "Rejected manual quad");
            return Err(PagewerkError::DegenerateQuad(
                "corners must form a convex quadrilateral with non-zero area".into(),
            ));
        }
        let started = Instant::now();
        let source = self.scoped(self.decode(bytes)?);
        let frame = self.dimensions(source.handle())?;
        if !within_frame(quad, frame) {
            warn!(quad = ?quad, width = frame.width, height = frame.height, "Manual quad outside photo");
            return Err(PagewerkError::DegenerateQuad(format!(
                "corners lie outside the {}x{} photo",
                frame.width, frame.height
            )));
        }
        finish(self, &source, quad.ordered(), options, started)
    }
}

fn within_frame(quad: &Quad, frame: Size) -> bool {
    let (w, h) = (frame.width as f32, frame.height as f32);
    let (mx, my) = (w * MANUAL_QUAD_MARGIN, h * MANUAL_QUAD_MARGIN);
    quad.points
        .iter()
        .all(|p| (-mx..=w + mx).contains(&p.x) && (-my..=h + my).contains(&p.y))
}

impl ImagingBackend for ScanPipeline {
    fn store(&self) -> &ImageStore {
        &self.store
    }

    fn detect(&self, handle: ImageHandle) -> Result<Option<Quad>> {
        let image = self.store.get(handle)?;
        Ok(QuadDetector::new(&self.config.detector).detect(&image))
    }

    fn guess_paper(&self, quad: &Quad) -> Option<PaperGuess> {
        paper::guess(quad, &self.config.paper)
    }

    fn rectify(&self, handle: ImageHandle, quad: &Quad, target: Option<Size>) -> Result<ImageHandle> {
        let image = self.store.get(handle)?;
        let rectified = rectify_image(&image, quad, target)?;
        Ok(self.store.insert(rectified))
    }

    fn enhance(&self, handle: ImageHandle, preset: Preset) -> Result<ImageHandle> {
        let image = self.store.get(handle)?;
        let enhanced = ScanEnhancer::new(&self.config.enhance).apply(&image, preset);
        Ok(self.store.insert(enhanced))
    }

    fn render_overlay(&self, handle: ImageHandle, quad: &Quad) -> Result<ImageHandle> {
        let image = self.store.get(handle)?;
        Ok(self.store.insert(overlay::render_overlay(&image, quad)))
    }
}

/// Run the full scan over any backend.
///
/// Fails with `NoDocumentDetected` (recoverable) when the photo has no page,
/// and with `Decode`/`Encode` on codec failures. No handles outlive the call.
#[instrument(skip_all, fields(bytes_len = bytes.len(), preset = %options.preset))]
pub fn process_with<B: ImagingBackend + ?Sized>(
    backend: &B,
    bytes: &[u8],
    options: &ScanOptions,
) -> Result<ScanResult> {
    let started = Instant::now();
    let source = backend.scoped(backend.decode(bytes)?);
    debug!(size = ?backend.dimensions(source.handle())?, "Photo decoded");

    let Some(quad) = backend.detect(source.handle())? else {
        warn!("No document detected");
        return Err(PagewerkError::NoDocumentDetected);
    };
    finish(backend, &source, quad, options, started)
}

/// Everything after detection.
fn finish<B: ImagingBackend + ?Sized>(
    backend: &B,
    source: &ScopedHandle<'_>,
    quad: Quad,
    options: &ScanOptions,
    started: Instant,
) -> Result<ScanResult> {
    let preset = Preset::from_name(&options.preset);

    let guess = backend.guess_paper(&quad);
    let target = guess.map(|g| g.canvas_for(&quad));
    debug!(paper = ?guess.map(|g| g.paper), target = ?target, "Paper guessed");

    let rectified = backend.scoped(backend.rectify(source.handle(), &quad, target)?);
    let enhanced = backend.scoped(backend.enhance(rectified.handle(), preset)?);
    drop(rectified);

    let output_size = backend.dimensions(enhanced.handle())?;
    let output_bytes = backend.encode(enhanced.handle(), options.output_format())?;
    drop(enhanced);
    debug!(bytes = output_bytes.len(), "Page encoded");

    let overlay_bytes = if options.include_overlay {
        let overlay = backend.scoped(backend.render_overlay(source.handle(), &quad)?);
        Some(backend.encode(overlay.handle(), options.overlay_format())?)
    } else {
        None
    };

    info!(
        paper = guess.map(|g| g.paper.label()).unwrap_or("none"),
        width = output_size.width,
        height = output_size.height,
        preset = preset.name(),
        bytes = output_bytes.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Scan complete"
    );

    Ok(ScanResult {
        output_bytes,
        quad,
        paper_label: guess.map(|g| g.paper),
        output_size,
        preset,
        overlay_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::processor::ImageProcessor;
    use crate::scan::ocr::PixelLayout;
    use crate::testing::SyntheticPage;
    use image::{DynamicImage, GrayImage, Luma};
    use pagewerk_core::{OutputFormat, PaperConfig, PaperSize};

    fn a4_photo_jpeg() -> Vec<u8> {
        let (photo, _) = SyntheticPage {
            width: 800,
            height: 600,
            page_w: 300,
            page_h: 424,
            angle_deg: 8.0,
            text: true,
        }
        .render();
        ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(photo))
            .to_jpeg_bytes(92)
            .unwrap()
    }

    fn blank_photo_jpeg() -> Vec<u8> {
        ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            320,
            240,
            Luma([128]),
        )))
        .to_jpeg_bytes(90)
        .unwrap()
    }

    fn pipeline() -> ScanPipeline {
        let config = ScanConfig {
            paper: PaperConfig {
                dpi: 72,
                ..PaperConfig::default()
            },
            ..ScanConfig::default()
        };
        ScanPipeline::new(config).unwrap()
    }

    fn options(preset: &str) -> ScanOptions {
        ScanOptions {
            preset: preset.into(),
            ..ScanOptions::default()
        }
    }

    #[test]
    fn rotated_a4_page_to_binary_jpeg() {
        let pipeline = pipeline();
        let result = pipeline.process_image(&a4_photo_jpeg(), &options("bw_pro")).unwrap();

        assert_eq!(result.paper_label, Some(PaperSize::A4));
        assert_eq!(result.preset, Preset::BwPro);
        assert_eq!(result.output_size, Size::new(595, 842));
        assert!(result.quad.signed_area() > 0.0);
        assert!(result.output_bytes.len() > 3000, "{} bytes", result.output_bytes.len());
        assert!(result.overlay_bytes.is_none());

        let page = ImageProcessor::from_bytes(&result.output_bytes).unwrap();
        assert!(matches!(page.as_dynamic(), DynamicImage::ImageLuma8(_)));
        let gray = page.as_dynamic().to_luma8();
        let extreme = gray.pixels().filter(|p| p.0[0] < 50 || p.0[0] > 205).count();
        assert!(extreme as f64 > 0.85 * gray.len() as f64);
        assert!(gray.pixels().any(|p| p.0[0] < 50), "text should survive");

        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn blank_photo_is_recoverable_and_leaves_no_buffers() {
        let pipeline = pipeline();
        let err = pipeline
            .process_image(&blank_photo_jpeg(), &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PagewerkError::NoDocumentDetected));
        assert!(err.is_recoverable());
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn garbage_bytes_are_decode_errors() {
        let pipeline = pipeline();
        let err = pipeline
            .process_image(b"not a photo", &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PagewerkError::Decode(_)));
        assert!(pipeline.shared_store().is_empty());
    }

    /// Delegates to a real pipeline but fails at enhancement.
    struct FailingEnhance(ScanPipeline);

    impl ImagingBackend for FailingEnhance {
        fn store(&self) -> &ImageStore {
            self.0.store()
        }
        fn detect(&self, handle: ImageHandle) -> Result<Option<Quad>> {
            self.0.detect(handle)
        }
        fn guess_paper(&self, quad: &Quad) -> Option<PaperGuess> {
            self.0.guess_paper(quad)
        }
        fn rectify(&self, handle: ImageHandle, quad: &Quad, target: Option<Size>) -> Result<ImageHandle> {
            self.0.rectify(handle, quad, target)
        }
        fn enhance(&self, _handle: ImageHandle, _preset: Preset) -> Result<ImageHandle> {
            Err(PagewerkError::Encode("enhancement backend unavailable".into()))
        }
        fn render_overlay(&self, handle: ImageHandle, quad: &Quad) -> Result<ImageHandle> {
            self.0.render_overlay(handle, quad)
        }
    }

    #[test]
    fn mid_pipeline_failure_releases_everything() {
        let backend = FailingEnhance(pipeline());
        let err = process_with(&backend, &a4_photo_jpeg(), &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, PagewerkError::Encode(_)));
        assert!(backend.store().is_empty());
    }

    #[test]
    fn overlay_is_png_of_the_original() {
        let pipeline = pipeline();
        let opts = ScanOptions {
            include_overlay: true,
            ..options("auto_pro")
        };
        let result = pipeline.process_image(&a4_photo_jpeg(), &opts).unwrap();
        let overlay = result.overlay_bytes.expect("overlay requested");
        assert_eq!(&overlay[..4], &[0x89, b'P', b'N', b'G']);
        let decoded = ImageProcessor::from_bytes(&overlay).unwrap();
        assert_eq!(decoded.size(), Size::new(800, 600));
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn unknown_preset_applies_minimal_and_lossless_is_png() {
        let pipeline = pipeline();
        let opts = ScanOptions {
            lossless_output: true,
            ..options("vintage")
        };
        let result = pipeline.process_image(&a4_photo_jpeg(), &opts).unwrap();
        assert_eq!(result.preset, Preset::Minimal);
        assert_eq!(&result.output_bytes[..4], &[0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn detect_only_reports_without_keeping_buffers() {
        let pipeline = pipeline();
        assert!(pipeline.detect_only(&a4_photo_jpeg()).unwrap().is_some());
        assert_eq!(pipeline.detect_only(&blank_photo_jpeg()).unwrap(), None);
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn manual_quad_skips_detection() {
        let pipeline = pipeline();
        // A blank photo has no detectable page, but manual corners still work.
        let quad = Quad::from_tuples([(300.0, 20.0), (20.0, 20.0), (20.0, 160.0), (300.0, 160.0)]);
        let result = pipeline
            .process_with_quad(&blank_photo_jpeg(), &quad, &options("color_pro"))
            .unwrap();
        assert_eq!(result.quad.top_left().x, 20.0);
        assert_eq!(result.paper_label, None);
        assert_eq!(result.output_size, Size::new(280, 140));
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn manual_degenerate_quad_is_rejected() {
        let pipeline = pipeline();
        let line = Quad::from_tuples([(0.0, 0.0), (5.0, 5.0), (10.0, 10.0), (15.0, 15.0)]);
        let err = pipeline
            .process_with_quad(&blank_photo_jpeg(), &line, &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PagewerkError::DegenerateQuad(_)));
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn manual_quad_far_outside_the_photo_is_rejected() {
        let pipeline = pipeline();
        let photo = ImageProcessor::from_dynamic(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            200,
            150,
            Luma([128]),
        )))
        .to_jpeg_bytes(90)
        .unwrap();
        let huge = Quad::from_tuples([
            (-20_000.0, -20_000.0),
            (40_000.0, -20_000.0),
            (40_000.0, 40_000.0),
            (-20_000.0, 40_000.0),
        ]);
        let err = pipeline
            .process_with_quad(&photo, &huge, &ScanOptions::default())
            .unwrap_err();
        assert!(matches!(err, PagewerkError::DegenerateQuad(_)));
        assert!(pipeline.shared_store().is_empty());

        // Corners dragged just past the edge are still accepted.
        let slack = Quad::from_tuples([(-15.0, -10.0), (212.0, -10.0), (212.0, 100.0), (-15.0, 100.0)]);
        let result = pipeline
            .process_with_quad(&photo, &slack, &options("color_pro"))
            .unwrap();
        assert_eq!(result.paper_label, None);
        assert_eq!(result.output_size, Size::new(227, 110));
        assert!(pipeline.shared_store().is_empty());
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = ScanConfig::default();
        config.detector.min_area_ratio = 0.9;
        config.detector.max_area_ratio = 0.5;
        assert!(matches!(
            ScanPipeline::new(config),
            Err(PagewerkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pipelines_share_a_store_across_threads() {
        let store = ImageStore::shared();
        let bytes = Arc::new(a4_photo_jpeg());
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let store = Arc::clone(&store);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || {
                    let pipeline = ScanPipeline::with_store(ScanConfig::default(), store).unwrap();
                    pipeline.detect_only(&bytes).unwrap().is_some()
                })
            })
            .collect();
        for worker in workers {
            assert!(worker.join().unwrap());
        }
        assert!(store.is_empty());
    }

    #[test]
    fn ocr_frame_from_a_live_handle() {
        let pipeline = pipeline();
        let handle = pipeline.decode(&blank_photo_jpeg()).unwrap();
        let frame = pipeline.ocr_frame(handle, PixelLayout::Gray8, 4).unwrap();
        assert_eq!((frame.width, frame.height, frame.stride), (320, 240, 320));
        pipeline.release(handle);
        assert!(matches!(
            pipeline.ocr_frame(handle, PixelLayout::Gray8, 4),
            Err(PagewerkError::InvalidHandle(_))
        ));
        assert_eq!(
            pipeline.encode(handle, OutputFormat::Png).unwrap_err().to_string(),
            format!("invalid image handle {handle}")
        );
    }

    #[test]
    fn pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScanPipeline>();
        assert_send_sync::<ImageStore>();
        assert_send_sync::<ScanConfig>();
    }
}
