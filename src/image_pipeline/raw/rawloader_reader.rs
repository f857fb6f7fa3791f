//! RAW frame reader implementation using the rawloader library.
//!
//! This module supports any RAW format rawloader can decode (ARW, CR2, NEF,
//! DNG, ...). It decodes the sensor data, crops it to the visible area and
//! extracts the generic metadata the pipeline needs: CFA layout, per-channel
//! black levels, camera white balance and the sensor color matrix.

use std::io::Cursor;

use rawloader::RawImageData as RawloaderImageData;
use tracing::{debug, warn};

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::raw::reader::RawFrameReader;
use crate::image_pipeline::raw::types::{CfaPattern, Mosaic, RawFrame, SensorMatrix};

/// RAW frame reader that uses the rawloader library for decoding.
pub struct RawLoaderReader;

/// Scale applied to float RAW data (normalized 0.0-1.0) so every frame
/// carries samples in sensor units.
const FLOAT_DATA_SCALE: f32 = u16::MAX as f32;

impl RawFrameReader for RawLoaderReader {
    /// Reads and decodes a RAW frame from a byte array.
    ///
    /// # Errors
    ///
    /// * [`ConversionError::DecodeError`] if rawloader cannot decode the bytes
    /// * [`ConversionError::UnsupportedSensor`] if the image is not a single
    ///   sample per pixel mosaic behind a 2x2 CFA of known channel codes
    fn read_raw(&self, data: &[u8]) -> Result<RawFrame> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| ConversionError::DecodeError(e.to_string()))?;

        if decoded.cpp != 1 {
            return Err(ConversionError::UnsupportedSensor(format!(
                "{} samples per pixel, expected a single-channel mosaic",
                decoded.cpp
            )));
        }

        let pattern = cfa_pattern(&decoded.cropped_cfa())?;

        debug!(
            "Decoded {} {}: {}x{}, crops {:?}, CFA {}",
            decoded.clean_make, decoded.clean_model, decoded.width, decoded.height, decoded.crops, pattern
        );

        let samples: Vec<f32> = match &decoded.data {
            RawloaderImageData::Integer(values) => values.iter().map(|&v| v as f32).collect(),
            RawloaderImageData::Float(values) => values.iter().map(|&v| v * FLOAT_DATA_SCALE).collect(),
        };

        let mosaic = visible_area(&samples, decoded.width, decoded.crops)?;

        let black_levels = decoded.blacklevels.map(f32::from);
        let white_level = decoded.whitelevels.iter().max().copied().map(f32::from).unwrap_or(0.0);

        Ok(RawFrame::builder(mosaic, pattern)
            .black_levels(black_levels)
            .white_balance(&decoded.wb_coeffs)
            .white_level(white_level)
            .sensor_matrix(sensor_matrix(&decoded.xyz_to_cam))
            .camera(decoded.clean_make.clone(), decoded.clean_model.clone())
            .source_data(data)
            .build())
    }
}

/// Reads the 2x2 tile of a CFA already shifted to the visible area.
fn cfa_pattern(cfa: &rawloader::CFA) -> Result<CfaPattern> {
    if cfa.width != 2 || cfa.height != 2 {
        return Err(ConversionError::UnsupportedSensor(format!(
            "CFA '{}' is {}x{}, expected a 2x2 tile",
            cfa.name, cfa.width, cfa.height
        )));
    }
    let mut tile = [[0u8; 2]; 2];
    for (row, codes) in tile.iter_mut().enumerate() {
        for (col, code) in codes.iter_mut().enumerate() {
            *code = u8::try_from(cfa.color_at(row, col)).unwrap_or(u8::MAX);
        }
    }
    CfaPattern::new(tile)
}

/// Cuts the visible area out of the full sensor buffer. `crops` is
/// `[top, right, bottom, left]` as rawloader reports it.
fn visible_area(samples: &[f32], full_width: usize, crops: [usize; 4]) -> Result<Mosaic> {
    let full_height = if full_width == 0 { 0 } else { samples.len() / full_width };
    let [top, right, bottom, left] = crops;
    let width = full_width.saturating_sub(left + right);
    let height = full_height.saturating_sub(top + bottom);
    if width == 0 || height == 0 {
        return Err(ConversionError::InvalidDimensions(width, height));
    }

    let visible = samples
        .chunks_exact(full_width)
        .skip(top)
        .take(height)
        .flat_map(|row| row[left..left + width].iter().copied())
        .collect();
    Mosaic::new(width, height, visible)
}

/// rawloader always reports a 4x3 matrix; an all-zero matrix means the camera
/// has no color data in its database.
fn sensor_matrix(rows: &[[f32; 3]; 4]) -> Option<SensorMatrix> {
    if rows.iter().flatten().all(|&v| v == 0.0) {
        warn!("RAW file carries no sensor color matrix");
        return None;
    }
    Some(SensorMatrix::from_rows(*rows))
}
