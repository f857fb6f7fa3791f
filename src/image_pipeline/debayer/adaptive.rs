use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::debayer::{Demosaicer, LibRawDeveloper, RgbImage};
use crate::image_pipeline::raw::types::{Mosaic, RawFrame};
use crate::image_pipeline::tone::normalize_exposure;

/// Output parameters handed to a [`RawDeveloper`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DevelopParams {
    /// Stretch the output so the brightest percent of pixels clip.
    pub auto_bright: bool,
    /// Output transfer gamma; 1.0 keeps the data linear.
    pub output_gamma: f32,
    /// Integer depth the output is quantized to.
    pub output_bits: u32,
    /// Multiply by the camera white balance before interpolating.
    pub use_camera_wb: bool,
}

impl Default for DevelopParams {
    fn default() -> Self {
        Self {
            auto_bright: false,
            output_gamma: 1.0,
            output_bits: 16,
            use_camera_wb: false,
        }
    }
}

/// Raw development backend reconstructing RGB from a mosaic.
///
/// Output samples are in the backend's integer scale (`0..=2^bits - 1`).
pub trait RawDeveloper {
    fn reconstruct(&self, frame: &RawFrame, mosaic: &Mosaic, params: &DevelopParams) -> Result<RgbImage>;
}

/// Adaptive demosaic delegated to a [`RawDeveloper`].
///
/// The mosaic handed over has already been white balanced by the stage engine,
/// so the developer always runs with `use_camera_wb` off. Its output is
/// sanitized and rescaled globally into [0, 1].
pub struct AdaptiveDemosaicer<D: RawDeveloper = LibRawDeveloper> {
    developer: D,
    params: DevelopParams,
}

impl Default for AdaptiveDemosaicer<LibRawDeveloper> {
    fn default() -> Self {
        Self::with_developer(LibRawDeveloper)
    }
}

impl<D: RawDeveloper> AdaptiveDemosaicer<D> {
    pub fn with_developer(developer: D) -> Self {
        Self {
            developer,
            params: DevelopParams::default(),
        }
    }

    pub fn params(&self) -> &DevelopParams {
        &self.params
    }
}

impl<D: RawDeveloper> Demosaicer for AdaptiveDemosaicer<D> {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn demosaic(&self, frame: &RawFrame, mosaic: &Mosaic) -> Result<RgbImage> {
        info!("Starting adaptive demosaic for image {}x{}", mosaic.width(), mosaic.height());

        let rgb = self.developer.reconstruct(frame, mosaic, &self.params)?;
        if rgb.width() == 0 || rgb.height() == 0 || rgb.data().len() != rgb.width() * rgb.height() * 3 {
            return Err(ConversionError::InvalidDimensions(rgb.width(), rgb.height()));
        }

        let (width, height) = (rgb.width(), rgb.height());
        let mut replaced = 0usize;
        let data: Vec<f32> = rgb
            .into_data()
            .into_iter()
            .map(|v| {
                if v.is_finite() {
                    v
                } else {
                    replaced += 1;
                    0.0
                }
            })
            .collect();
        if replaced > 0 {
            warn!("Replaced {} non-finite samples from the raw developer", replaced);
        }
        debug!("Adaptive demosaic output {}x{}x3", width, height);

        Ok(normalize_exposure(&RgbImage::from_parts(width, height, data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::raw::types::CfaPattern;

    struct NoisyDeveloper {
        seen: std::sync::Arc<std::sync::Mutex<Vec<DevelopParams>>>,
    }

    impl RawDeveloper for NoisyDeveloper {
        fn reconstruct(&self, _frame: &RawFrame, mosaic: &Mosaic, params: &DevelopParams) -> Result<RgbImage> {
            self.seen.lock().unwrap().push(*params);
            let mut data = vec![100.0f32; mosaic.width() * mosaic.height() * 3];
            data[0] = f32::NAN;
            data[1] = f32::INFINITY;
            data[2] = f32::NEG_INFINITY;
            data[3] = 400.0;
            Ok(RgbImage::from_parts(mosaic.width(), mosaic.height(), data))
        }
    }

    struct TruncatingDeveloper;

    impl RawDeveloper for TruncatingDeveloper {
        fn reconstruct(&self, _frame: &RawFrame, mosaic: &Mosaic, _params: &DevelopParams) -> Result<RgbImage> {
            Ok(RgbImage::from_parts(mosaic.width(), mosaic.height(), vec![0.0; 3]))
        }
    }

    fn frame() -> RawFrame {
        RawFrame::builder(Mosaic::from_fn(4, 4, |_, _| 10.0), CfaPattern::rggb()).build()
    }

    #[test]
    fn developer_runs_linear_sixteen_bit_without_wb() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let demosaicer = AdaptiveDemosaicer::with_developer(NoisyDeveloper { seen: seen.clone() });
        let frame = frame();
        demosaicer.demosaic(&frame, frame.mosaic()).unwrap();

        let params = seen.lock().unwrap()[0];
        assert!(!params.auto_bright);
        assert_eq!(params.output_gamma, 1.0);
        assert_eq!(params.output_bits, 16);
        assert!(!params.use_camera_wb);
    }

    #[test]
    fn non_finite_samples_become_zero() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let demosaicer = AdaptiveDemosaicer::with_developer(NoisyDeveloper { seen });
        let frame = frame();
        let rgb = demosaicer.demosaic(&frame, frame.mosaic()).unwrap();

        assert!(rgb.data().iter().all(|v| v.is_finite()));
        assert_eq!(&rgb.data()[..4], &[0.0, 0.0, 0.0, 1.0]);
        assert!((rgb.data()[4] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn malformed_developer_output_is_rejected() {
        let demosaicer = AdaptiveDemosaicer::with_developer(TruncatingDeveloper);
        let frame = frame();
        let err = demosaicer.demosaic(&frame, frame.mosaic()).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidDimensions(4, 4)));
    }
}
