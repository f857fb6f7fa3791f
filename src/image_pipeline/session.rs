//! Interactive session state.
//!
//! Holds one loaded frame and the current [`RenderRequest`]. Parameter setters
//! build a new request; [`RenderSession::current`] renders it. The last result
//! is memoized per request and dropped whenever a different frame is loaded.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::debayer::DemosaicAlgorithm;
use crate::image_pipeline::raw::types::RawFrame;
use crate::image_pipeline::render::{Overlays, PipelineStage, RenderRequest, StageImage, render};

/// Gamma range exposed to interactive controls.
pub const GAMMA_RANGE: std::ops::RangeInclusive<f32> = 1.0..=4.0;

pub struct RenderSession {
    frame: Arc<RawFrame>,
    request: RenderRequest,
    cached: Option<(RenderRequest, StageImage)>,
    renders: usize,
}

impl RenderSession {
    pub fn new(frame: impl Into<Arc<RawFrame>>) -> Self {
        Self {
            frame: frame.into(),
            request: RenderRequest::default(),
            cached: None,
            renders: 0,
        }
    }

    pub fn frame(&self) -> &Arc<RawFrame> {
        &self.frame
    }

    pub fn request(&self) -> &RenderRequest {
        &self.request
    }

    /// Swaps in a new frame and keeps the current parameters.
    pub fn load(&mut self, frame: impl Into<Arc<RawFrame>>) {
        let frame = frame.into();
        if !Arc::ptr_eq(&frame, &self.frame) {
            self.cached = None;
        }
        self.frame = frame;
    }

    pub fn advance_stage(&mut self) -> PipelineStage {
        self.request.stage = self.request.stage.next();
        info!("{}", self.request.stage);
        self.request.stage
    }

    pub fn set_stage(&mut self, stage: PipelineStage) {
        self.request.stage = stage;
    }

    /// Sets the display gamma, clamped to [`GAMMA_RANGE`]. NaN is ignored.
    pub fn set_gamma(&mut self, gamma: f32) {
        if gamma.is_nan() {
            warn!("Ignoring NaN gamma, keeping {}", self.request.gamma);
            return;
        }
        self.request.gamma = gamma.clamp(*GAMMA_RANGE.start(), *GAMMA_RANGE.end());
    }

    pub fn set_algorithm(&mut self, algorithm: DemosaicAlgorithm) {
        self.request.algorithm = algorithm;
    }

    pub fn set_overlays(&mut self, overlays: Overlays) {
        self.request.overlays = overlays;
    }

    pub fn set_color_correction(&mut self, enable: bool) {
        self.request.color_correction = enable;
    }

    /// Renders the current request, reusing the previous result when the
    /// request has not changed since.
    pub fn current(&mut self) -> Result<&StageImage> {
        let entry = match self.cached.take() {
            Some((request, image)) if request == self.request => (request, image),
            _ => {
                debug!(request = ?self.request, "Rendering");
                let image = render(&self.frame, &self.request)?;
                self.renders += 1;
                (self.request, image)
            }
        };
        let (_, image) = self.cached.insert(entry);
        Ok(image)
    }

    /// Number of full recomputations performed so far.
    pub fn render_count(&self) -> usize {
        self.renders
    }
}
