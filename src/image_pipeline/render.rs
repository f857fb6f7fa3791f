//! Stage-by-stage rendering of a [`RawFrame`].
//!
//! [`render`] recomputes everything from the pristine mosaic for every
//! request; nothing is cached between calls.

use std::fmt;

use tracing::{debug, info_span, instrument};

use crate::image_pipeline::bayer_stage::{apply_white_balance, subtract_black};
use crate::image_pipeline::common::buffer::PixelBuffer;
use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::debayer::{DemosaicAlgorithm, RgbImage};
use crate::image_pipeline::raw::types::{Mosaic, RawFrame};
use crate::image_pipeline::tone::{dual_gain_view, gamma_encode, normalize_exposure};
use crate::image_pipeline::visualize::{demosaic_error_view, draw_bayer_grid};

/// Ordered processing stages; each includes every stage before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineStage {
    #[default]
    RawMosaic = 0,
    BlackSubtracted = 1,
    WhiteBalanced = 2,
    Demosaiced = 3,
    Normalized = 4,
    GammaEncoded = 5,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 6] = [
        Self::RawMosaic,
        Self::BlackSubtracted,
        Self::WhiteBalanced,
        Self::Demosaiced,
        Self::Normalized,
        Self::GammaEncoded,
    ];

    /// Stage for an ordinal; out-of-range ordinals wrap modulo 6.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// The following stage, wrapping from the last back to the raw mosaic.
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RawMosaic => "Raw Bayer",
            Self::BlackSubtracted => "Black level subtracted",
            Self::WhiteBalanced => "White balance applied",
            Self::Demosaiced => "Demosaiced",
            Self::Normalized => "Normalized",
            Self::GammaEncoded => "Gamma corrected",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}: {}", self.index(), self.label())
    }
}

/// Diagnostic views layered over the committed pipeline output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Overlays {
    /// Tint each photosite with its CFA color (3-channel outputs only).
    pub bayer_grid: bool,
    /// Show the dual-gain blend instead of the mosaic (stages 0-2).
    pub dual_gain: bool,
    /// Replace the demosaiced image with its chroma error map (stage 3+).
    pub demosaic_error: bool,
}

/// Immutable description of one render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub stage: PipelineStage,
    pub gamma: f32,
    pub algorithm: DemosaicAlgorithm,
    pub overlays: Overlays,
    /// Apply the frame's sensor to sRGB transform after demosaicing, if it has one.
    pub color_correction: bool,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            stage: PipelineStage::RawMosaic,
            gamma: 2.2,
            algorithm: DemosaicAlgorithm::Bilinear,
            overlays: Overlays::default(),
            color_correction: false,
        }
    }
}

impl RenderRequest {
    pub fn builder() -> RenderRequestBuilder {
        RenderRequestBuilder::default()
    }
}

/// Builder for RenderRequest
#[derive(Default)]
pub struct RenderRequestBuilder {
    stage: Option<PipelineStage>,
    gamma: Option<f32>,
    algorithm: Option<DemosaicAlgorithm>,
    overlays: Option<Overlays>,
    color_correction: Option<bool>,
}

impl RenderRequestBuilder {
    pub fn stage(mut self, stage: PipelineStage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn algorithm(mut self, algorithm: DemosaicAlgorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn overlays(mut self, overlays: Overlays) -> Self {
        self.overlays = Some(overlays);
        self
    }

    pub fn color_correction(mut self, enable: bool) -> Self {
        self.color_correction = Some(enable);
        self
    }

    pub fn build(self) -> RenderRequest {
        let default = RenderRequest::default();
        RenderRequest {
            stage: self.stage.unwrap_or(default.stage),
            gamma: self.gamma.unwrap_or(default.gamma),
            algorithm: self.algorithm.unwrap_or(default.algorithm),
            overlays: self.overlays.unwrap_or(default.overlays),
            color_correction: self.color_correction.unwrap_or(default.color_correction),
        }
    }
}

/// Display buffer produced by a render, always within [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum StageImage {
    /// Single-channel view of the mosaic (stages before demosaicing).
    Mosaic(Mosaic),
    Rgb(RgbImage),
}

impl StageImage {
    pub fn width(&self) -> usize {
        match self {
            Self::Mosaic(m) => m.width(),
            Self::Rgb(rgb) => rgb.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Mosaic(m) => m.height(),
            Self::Rgb(rgb) => rgb.height(),
        }
    }

    pub fn channels(&self) -> usize {
        match self {
            Self::Mosaic(_) => 1,
            Self::Rgb(_) => 3,
        }
    }

    pub fn samples(&self) -> &[f32] {
        match self {
            Self::Mosaic(m) => m.samples(),
            Self::Rgb(rgb) => rgb.samples(),
        }
    }

    /// Channel values at (x, y), or `None` outside the image.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[f32]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        let channels = self.channels();
        let idx = (y * self.width() + x) * channels;
        Some(&self.samples()[idx..idx + channels])
    }
}

/// Renders `frame` up to `request.stage`.
///
/// # Errors
///
/// Only the demosaic stage can fail: the bilinear strategy rejects
/// non-canonical CFA layouts, and either strategy can report a backend failure.
#[instrument(skip(frame), fields(width = frame.width(), height = frame.height()))]
pub fn render(frame: &RawFrame, request: &RenderRequest) -> Result<StageImage> {
    let stage = request.stage;
    let pattern = frame.pattern();

    let mut mosaic = frame.mosaic().clone();
    if stage >= PipelineStage::BlackSubtracted {
        mosaic = subtract_black(&mosaic, frame.black_levels(), pattern);
    }
    if stage >= PipelineStage::WhiteBalanced {
        mosaic = apply_white_balance(&mosaic, frame.white_balance(), pattern);
    }

    if stage < PipelineStage::Demosaiced {
        let view = if request.overlays.dual_gain {
            dual_gain_view(&mosaic)
        } else {
            mosaic
        };
        return Ok(StageImage::Mosaic(normalize_exposure(&view)));
    }

    let mut rgb = {
        let demosaicer = request.algorithm.demosaicer();
        let _span = info_span!("demosaic", algorithm = demosaicer.name()).entered();
        demosaicer.demosaic(frame, &mosaic)?
    };
    let (lo, hi) = rgb.min_max();
    debug!(width = rgb.width(), height = rgb.height(), min = lo, max = hi, "Demosaiced");

    if request.color_correction {
        match frame.color_transform() {
            Some(transform) => rgb = transform.apply(&rgb),
            None => debug!("No color transform for this frame, skipping color correction"),
        }
    }
    if request.overlays.demosaic_error {
        rgb = demosaic_error_view(&rgb);
    }
    if stage >= PipelineStage::Normalized {
        rgb = normalize_exposure(&rgb);
    }
    if stage >= PipelineStage::GammaEncoded {
        rgb = gamma_encode(&rgb, request.gamma);
    }

    rgb = normalize_exposure(&rgb);
    if request.overlays.bayer_grid {
        rgb = draw_bayer_grid(&rgb, pattern);
    }
    Ok(StageImage::Rgb(rgb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::common::error::ConversionError;
    use crate::image_pipeline::raw::types::{CfaPattern, SensorMatrix};

    fn synthetic_frame() -> RawFrame {
        let mosaic = Mosaic::from_fn(16, 12, |row, col| ((row * 131 + col * 71) % 1001) as f32);
        RawFrame::builder(mosaic, CfaPattern::rggb())
            .black_levels([0.0; 4])
            .white_balance(&[1.0, 1.0, 1.0, 1.0])
            .white_level(1000.0)
            .build()
    }

    fn in_unit_range(image: &StageImage) -> bool {
        image.samples().iter().all(|v| (0.0..=1.0).contains(v))
    }

    #[test]
    fn stage_advance_wraps() {
        assert_eq!(PipelineStage::GammaEncoded.next(), PipelineStage::RawMosaic);
        assert_eq!(PipelineStage::RawMosaic.next(), PipelineStage::BlackSubtracted);
        assert_eq!(PipelineStage::from_index(9), PipelineStage::Demosaiced);
        assert_eq!(PipelineStage::Normalized.to_string(), "Stage 4: Normalized");
    }

    #[test]
    fn walking_all_stages_yields_expected_shapes() {
        let frame = synthetic_frame();
        let mut stage = PipelineStage::RawMosaic;
        for _ in 0..6 {
            let request = RenderRequest::builder().stage(stage).build();
            let image = render(&frame, &request).unwrap();
            assert!(in_unit_range(&image), "{stage} out of range");
            if stage >= PipelineStage::Demosaiced {
                assert_eq!(image.channels(), 3, "{stage}");
            } else {
                assert_eq!(image.channels(), 1, "{stage}");
            }
            assert_eq!((image.width(), image.height()), (16, 12));
            stage = stage.next();
        }
        assert_eq!(stage, PipelineStage::RawMosaic);
    }

    #[test]
    fn adaptive_path_renders_every_stage() {
        let frame = synthetic_frame();
        for stage in PipelineStage::ALL {
            let request = RenderRequest::builder()
                .stage(stage)
                .algorithm(DemosaicAlgorithm::Adaptive)
                .build();
            let image = render(&frame, &request).unwrap();
            assert!(in_unit_range(&image));
        }
    }

    #[test]
    fn render_does_not_mutate_the_frame() {
        let frame = synthetic_frame();
        let before = frame.mosaic().clone();
        let request = RenderRequest::builder()
            .stage(PipelineStage::GammaEncoded)
            .overlays(Overlays { bayer_grid: true, dual_gain: true, demosaic_error: true })
            .build();
        render(&frame, &request).unwrap();
        assert_eq!(frame.mosaic(), &before);
    }

    #[test]
    fn black_level_shows_up_at_stage_one() {
        let mosaic = Mosaic::from_fn(4, 4, |row, col| if (row + col) % 2 == 0 { 100.0 } else { 300.0 });
        let frame = RawFrame::builder(mosaic, CfaPattern::rggb())
            .black_levels([100.0, 0.0, 100.0, 0.0])
            .build();
        let request = RenderRequest::builder().stage(PipelineStage::BlackSubtracted).build();
        let StageImage::Mosaic(view) = render(&frame, &request).unwrap() else {
            panic!("expected a mosaic view");
        };
        assert_eq!(view.get(0, 0), 0.0);
        assert_eq!(view.get(0, 1), 1.0);
    }

    #[test]
    fn unsupported_pattern_fails_only_the_bilinear_path() {
        let mosaic = Mosaic::from_fn(8, 8, |row, col| (row * 8 + col) as f32);
        let pattern = CfaPattern::new([[0, 0], [1, 2]]).unwrap();
        let frame = RawFrame::builder(mosaic, pattern).build();

        let bilinear = RenderRequest::builder().stage(PipelineStage::Demosaiced).build();
        assert!(matches!(render(&frame, &bilinear), Err(ConversionError::UnsupportedPattern(_))));

        let adaptive = RenderRequest::builder()
            .stage(PipelineStage::Demosaiced)
            .algorithm(DemosaicAlgorithm::Adaptive)
            .build();
        assert!(render(&frame, &adaptive).is_ok());

        let early = RenderRequest::builder().stage(PipelineStage::WhiteBalanced).build();
        assert!(render(&frame, &early).is_ok());
    }

    #[test]
    fn color_correction_uses_the_resolved_transform() {
        let mosaic = Mosaic::from_fn(8, 8, |row, col| ((row * 8 + col) * 10) as f32);
        let frame = RawFrame::builder(mosaic, CfaPattern::rggb())
            .sensor_matrix(Some(SensorMatrix::from_rows([[0.4, 0.35, 0.2], [0.2, 0.7, 0.1], [0.02, 0.1, 0.95]])))
            .build();
        let plain = RenderRequest::builder().stage(PipelineStage::Demosaiced).build();
        let corrected = RenderRequest::builder()
            .stage(PipelineStage::Demosaiced)
            .color_correction(true)
            .build();

        let a = render(&frame, &plain).unwrap();
        let b = render(&frame, &corrected).unwrap();
        assert_ne!(a, b);
        assert!(in_unit_range(&b));
    }

    #[test]
    fn nan_gamma_still_yields_a_display_buffer() {
        let frame = synthetic_frame();
        let request = RenderRequest::builder()
            .stage(PipelineStage::GammaEncoded)
            .gamma(f32::NAN)
            .build();
        let image = render(&frame, &request).unwrap();
        assert!(in_unit_range(&image));
    }

    #[test]
    fn pixel_probe_respects_bounds() {
        let frame = synthetic_frame();
        let request = RenderRequest::builder().stage(PipelineStage::Demosaiced).build();
        let image = render(&frame, &request).unwrap();
        assert_eq!(image.pixel(0, 0).map(<[f32]>::len), Some(3));
        assert!(image.pixel(16, 0).is_none());
        assert!(image.pixel(0, 12).is_none());
    }
}
