use std::io::Cursor;

use bayer::{BayerDepth, Demosaic, RasterDepth, RasterMut};
use tracing::{debug, info};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::debayer::{BayerLayout, Demosaicer, RgbImage};
use crate::image_pipeline::raw::types::{Mosaic, RawFrame};

/// Upper bound of the 16-bit integer depth samples are clamped into.
const MAX_SAMPLE: f32 = u16::MAX as f32;

/// Fast bilinear demosaic through the `bayer` crate.
///
/// Only the four canonical layouts are accepted; output channels are each
/// rescaled into [0, 1].
pub struct BilinearDemosaicer;

impl Demosaicer for BilinearDemosaicer {
    fn name(&self) -> &'static str {
        "bilinear"
    }

    fn demosaic(&self, frame: &RawFrame, mosaic: &Mosaic) -> Result<RgbImage> {
        let cfa = BayerLayout::from_pattern(frame.pattern())
            .bayer_cfa()
            .ok_or(ConversionError::UnsupportedPattern(*frame.pattern()))?;

        let mosaic = mosaic.even_cropped();
        let width = mosaic.width();
        let height = mosaic.height();
        if width < 2 || height < 2 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        info!("Starting bilinear demosaic for image {}x{}, CFA={}", width, height, frame.pattern());

        let bayer_bytes: Vec<u8> = mosaic
            .data()
            .iter()
            .flat_map(|&v| (v.clamp(0.0, MAX_SAMPLE) as u16).to_le_bytes())
            .collect();

        let bytes_per_pixel = 2;
        let mut output_buf = vec![0u8; width * height * 3 * bytes_per_pixel];
        let mut cursor = Cursor::new(&bayer_bytes[..]);

        debug!("Input bytes: {}, output buffer: {}", bayer_bytes.len(), output_buf.len());

        {
            let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
            bayer::run_demosaic(
                &mut cursor,
                BayerDepth::Depth16LE,
                cfa,
                Demosaic::Linear,
                &mut output_raster,
            )
            .map_err(|e| ConversionError::DemosaicError(format!("{e:?}")))?;
        }

        let data: Vec<f32> = output_buf
            .chunks_exact(bytes_per_pixel)
            .map(|b| u16::from_ne_bytes([b[0], b[1]]) as f32)
            .collect();

        Ok(RgbImage::from_parts(width, height, data).normalized_per_channel())
    }
}
