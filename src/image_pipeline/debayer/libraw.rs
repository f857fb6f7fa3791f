//! LibRaw-backed raw developer.
//!
//! LibRaw decodes the encoded file on its own, so the mosaic handed to
//! [`RawDeveloper::reconstruct`] is not what it interpolates. The frame's
//! white balance is passed in as user multipliers instead; the camera's
//! as-shot lookup stays off so the gains are applied exactly once.

use rsraw::{BIT_DEPTH_16, RawImage};
use tracing::{debug, info, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::debayer::{DevelopParams, PpgDeveloper, RawDeveloper, RgbImage};
use crate::image_pipeline::raw::types::{Mosaic, RawFrame};

/// LibRaw interpolation quality code for AHD.
const AHD_QUALITY: i32 = 3;
/// LibRaw output color space code for the camera's native space.
const RAW_COLOR_SPACE: i32 = 0;

/// AHD demosaic through LibRaw.
///
/// Frames built without their encoded file (synthetic or already decoded
/// buffers) fall back to [`PpgDeveloper`] on the mosaic.
pub struct LibRawDeveloper;

impl RawDeveloper for LibRawDeveloper {
    fn reconstruct(&self, frame: &RawFrame, mosaic: &Mosaic, params: &DevelopParams) -> Result<RgbImage> {
        match frame.source_data() {
            Some(data) => develop(data, frame, params),
            None => {
                debug!("Frame has no encoded source, developing the mosaic with PPG");
                PpgDeveloper.reconstruct(frame, mosaic, params)
            }
        }
    }
}

fn develop(data: &[u8], frame: &RawFrame, params: &DevelopParams) -> Result<RgbImage> {
    let mut raw = RawImage::open(data)
        .map_err(|e| ConversionError::DecodeError(format!("LibRaw open failed: {e:?}")))?;

    {
        let libraw_data: &mut rsraw_sys::libraw_data_t = raw.as_mut();
        let out = &mut libraw_data.params;
        out.user_qual = AHD_QUALITY;
        out.no_auto_bright = i32::from(!params.auto_bright);
        out.gamm[0] = 1.0 / f64::from(params.output_gamma.max(f32::EPSILON));
        out.gamm[1] = 1.0;
        out.output_bps = params.output_bits as i32;
        out.output_color = RAW_COLOR_SPACE;
        out.user_flip = 0;
        out.use_auto_wb = 0;
        out.use_camera_wb = i32::from(params.use_camera_wb);
        if !params.use_camera_wb {
            out.user_mul = *frame.white_balance();
        }
    }

    raw.unpack()
        .map_err(|e| ConversionError::DecodeError(format!("LibRaw unpack failed: {e:?}")))?;

    let processed = raw
        .process::<BIT_DEPTH_16>()
        .map_err(|e| ConversionError::DemosaicError(format!("LibRaw process failed: {e:?}")))?;

    let width = processed.width() as usize;
    let height = processed.height() as usize;
    let colors = processed.colors() as usize;
    info!("LibRaw AHD output {}x{}, {} colors", width, height, colors);

    let pixels: &[u16] = &processed;
    let data = interleaved_rgb(pixels, width, height, colors)?;
    Ok(RgbImage::from_parts(width, height, data))
}

/// Repacks LibRaw's output into 3-channel samples, dropping a fourth channel
/// and expanding grayscale.
fn interleaved_rgb(pixels: &[u16], width: usize, height: usize, colors: usize) -> Result<Vec<f32>> {
    let expected = width * height * colors;
    if colors == 0 || pixels.len() < expected {
        warn!("LibRaw returned {} samples, expected {}", pixels.len(), expected);
        return Err(ConversionError::InvalidDimensions(width, height));
    }

    let pixels = &pixels[..expected];
    let data = match colors {
        1 => pixels.iter().flat_map(|&v| [v as f32; 3]).collect(),
        3 => pixels.iter().map(|&v| v as f32).collect(),
        4 => pixels
            .chunks_exact(4)
            .flat_map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
            .collect(),
        n => {
            return Err(ConversionError::DemosaicError(format!(
                "Unexpected LibRaw channel count: {n}"
            )));
        }
    };
    Ok(data)
}
