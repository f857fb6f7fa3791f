//! RAW frame data types

use std::fmt;
use std::sync::Arc;

use crate::image_pipeline::bayer_stage::normalize_white_balance;
use crate::image_pipeline::color::{ColorTransform, resolve_color_transform};
use crate::image_pipeline::common::buffer::PixelBuffer;
use crate::image_pipeline::common::error::{ConversionError, Result};

/// Channel code for red photosites.
pub const CFA_RED: u8 = 0;
/// Channel code for the primary green photosites.
pub const CFA_GREEN: u8 = 1;
/// Channel code for blue photosites.
pub const CFA_BLUE: u8 = 2;
/// Channel code for the alternate green photosites.
pub const CFA_GREEN_ALT: u8 = 3;

/// Sensor white level assumed when the decoder does not report one.
pub const DEFAULT_WHITE_LEVEL: f32 = 65535.0;

/// Single-channel sensor readout, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Mosaic {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(ConversionError::InvalidDimensions(width, height));
        }
        Ok(Self { width, height, data })
    }

    /// Builds a mosaic by evaluating `f(row, col)` at every photosite.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> f32) -> Self {
        let data = (0..height)
            .flat_map(|row| (0..width).map(move |col| (row, col)))
            .map(|(row, col)| f(row, col))
            .collect();
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    /// Copy of the mosaic with a trailing odd row and column discarded.
    pub fn even_cropped(&self) -> Mosaic {
        let width = self.width - self.width % 2;
        let height = self.height - self.height % 2;
        if width == self.width && height == self.height {
            return self.clone();
        }
        let data = self
            .data
            .chunks_exact(self.width)
            .take(height)
            .flat_map(|row| row[..width].iter().copied())
            .collect();
        Mosaic { width, height, data }
    }
}

impl PixelBuffer for Mosaic {
    fn samples(&self) -> &[f32] {
        &self.data
    }

    fn with_samples(&self, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), self.data.len());
        Mosaic {
            width: self.width,
            height: self.height,
            data: samples,
        }
    }
}

/// 2x2 color filter tile. Codes follow the decoder convention:
/// 0 = R, 1 = G, 2 = B, 3 = alternate G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CfaPattern {
    tile: [[u8; 2]; 2],
}

impl CfaPattern {
    pub fn new(tile: [[u8; 2]; 2]) -> Result<Self> {
        if tile.iter().flatten().any(|&code| code > CFA_GREEN_ALT) {
            return Err(ConversionError::UnsupportedSensor(format!(
                "CFA tile {tile:?} contains an unknown channel code"
            )));
        }
        Ok(Self { tile })
    }

    pub fn rggb() -> Self {
        Self { tile: [[CFA_RED, CFA_GREEN], [CFA_GREEN_ALT, CFA_BLUE]] }
    }

    pub fn bggr() -> Self {
        Self { tile: [[CFA_BLUE, CFA_GREEN], [CFA_GREEN_ALT, CFA_RED]] }
    }

    pub fn grbg() -> Self {
        Self { tile: [[CFA_GREEN, CFA_RED], [CFA_BLUE, CFA_GREEN_ALT]] }
    }

    pub fn gbrg() -> Self {
        Self { tile: [[CFA_GREEN, CFA_BLUE], [CFA_RED, CFA_GREEN_ALT]] }
    }

    pub fn tile(&self) -> [[u8; 2]; 2] {
        self.tile
    }

    /// Raw channel code at a sensor position (wraps modulo the tile).
    #[inline]
    pub fn code_at(&self, row: usize, col: usize) -> usize {
        self.tile[row % 2][col % 2] as usize
    }

    /// RGB channel index at a sensor position; both greens map to 1.
    #[inline]
    pub fn channel_at(&self, row: usize, col: usize) -> usize {
        match self.tile[row % 2][col % 2] {
            CFA_GREEN_ALT => CFA_GREEN as usize,
            code => code as usize,
        }
    }

    /// Same tile with the alternate green folded into the primary green code.
    pub fn normalized(&self) -> CfaPattern {
        let mut tile = self.tile;
        for code in tile.iter_mut().flatten() {
            if *code == CFA_GREEN_ALT {
                *code = CFA_GREEN;
            }
        }
        CfaPattern { tile }
    }
}

impl fmt::Display for CfaPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in self.tile.iter().flatten() {
            let letter = match *code {
                CFA_RED => 'R',
                CFA_BLUE => 'B',
                _ => 'G',
            };
            write!(f, "{letter}")?;
        }
        Ok(())
    }
}

/// Sensor-to-XYZ matrix as reported by the decoder, shape preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
}

impl SensorMatrix {
    /// Row-major values. A `values` length that disagrees with the shape is kept
    /// as-is and rejected later by the color matrix resolver.
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Self {
        Self { rows, cols, values }
    }

    pub fn from_rows<const R: usize, const C: usize>(rows: [[f32; C]; R]) -> Self {
        Self {
            rows: R,
            cols: C,
            values: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.cols + col]
    }
}

/// Decoded capture, immutable once built.
///
/// The color transform is resolved from the sensor matrix exactly once, when
/// the frame is built. Every render reads the pristine mosaic from here.
#[derive(Debug, Clone)]
pub struct RawFrame {
    mosaic: Mosaic,
    pattern: CfaPattern,
    black_levels: [f32; 4],
    white_balance: [f32; 4],
    white_level: f32,
    sensor_matrix: Option<SensorMatrix>,
    color_transform: Option<ColorTransform>,
    make: String,
    model: String,
    source: Option<Arc<[u8]>>,
}

impl RawFrame {
    pub fn builder(mosaic: Mosaic, pattern: CfaPattern) -> RawFrameBuilder {
        RawFrameBuilder {
            mosaic,
            pattern,
            black_levels: [0.0; 4],
            white_balance: vec![1.0; 4],
            white_level: DEFAULT_WHITE_LEVEL,
            sensor_matrix: None,
            make: String::new(),
            model: String::new(),
            source: None,
        }
    }

    pub fn mosaic(&self) -> &Mosaic {
        &self.mosaic
    }

    pub fn pattern(&self) -> &CfaPattern {
        &self.pattern
    }

    /// Per-channel black level, indexed by CFA channel code.
    pub fn black_levels(&self) -> &[f32; 4] {
        &self.black_levels
    }

    /// Camera white balance, indexed by CFA channel code, green rescaled to 1.0.
    pub fn white_balance(&self) -> &[f32; 4] {
        &self.white_balance
    }

    pub fn white_level(&self) -> f32 {
        self.white_level
    }

    pub fn sensor_matrix(&self) -> Option<&SensorMatrix> {
        self.sensor_matrix.as_ref()
    }

    pub fn color_transform(&self) -> Option<&ColorTransform> {
        self.color_transform.as_ref()
    }

    /// The encoded file the frame was decoded from, if it came from one.
    pub fn source_data(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    pub fn width(&self) -> usize {
        self.mosaic.width
    }

    pub fn height(&self) -> usize {
        self.mosaic.height
    }

    /// Human-readable metadata report.
    pub fn summary(&self) -> String {
        let mut text = String::new();
        text += &format!("Camera: {} {}\n", self.make, self.model);
        text += &format!("Size: {}x{}\n", self.mosaic.width, self.mosaic.height);
        text += &format!("CFA pattern: {} {:?}\n", self.pattern, self.pattern.tile());
        text += &format!("White level: {}\n", self.white_level);
        text += &format!("Black levels: {:?}\n", self.black_levels);
        text += &format!("WB multipliers: {:?}\n", self.white_balance);
        match &self.sensor_matrix {
            Some(matrix) => {
                let (rows, cols) = matrix.shape();
                text += &format!("Color matrix ({rows}x{cols}):\n");
                for row in matrix.values().chunks(cols.max(1)) {
                    text += &format!("  {row:?}\n");
                }
            }
            None => text += "Color matrix: none\n",
        }
        text += &format!(
            "Color correction: {}\n",
            if self.color_transform.is_some() { "available" } else { "disabled" }
        );
        text
    }
}

pub struct RawFrameBuilder {
    mosaic: Mosaic,
    pattern: CfaPattern,
    black_levels: [f32; 4],
    white_balance: Vec<f32>,
    white_level: f32,
    sensor_matrix: Option<SensorMatrix>,
    make: String,
    model: String,
    source: Option<Arc<[u8]>>,
}

impl RawFrameBuilder {
    pub fn black_levels(mut self, black_levels: [f32; 4]) -> Self {
        self.black_levels = black_levels;
        self
    }

    /// Camera multipliers in R, G1, B, [G2] order.
    pub fn white_balance(mut self, multipliers: &[f32]) -> Self {
        self.white_balance = multipliers.to_vec();
        self
    }

    pub fn white_level(mut self, white_level: f32) -> Self {
        self.white_level = white_level;
        self
    }

    pub fn sensor_matrix(mut self, matrix: Option<SensorMatrix>) -> Self {
        self.sensor_matrix = matrix;
        self
    }

    pub fn camera(mut self, make: impl Into<String>, model: impl Into<String>) -> Self {
        self.make = make.into();
        self.model = model.into();
        self
    }

    /// Keeps a copy of the encoded file for backends that decode it themselves.
    pub fn source_data(mut self, data: &[u8]) -> Self {
        self.source = Some(Arc::from(data));
        self
    }

    pub fn build(self) -> RawFrame {
        let color_transform = resolve_color_transform(self.sensor_matrix.as_ref());
        let white_level = if self.white_level > 0.0 { self.white_level } else { DEFAULT_WHITE_LEVEL };
        RawFrame {
            mosaic: self.mosaic,
            pattern: self.pattern,
            black_levels: self.black_levels,
            white_balance: normalize_white_balance(&self.white_balance),
            white_level,
            sensor_matrix: self.sensor_matrix,
            color_transform,
            make: self.make,
            model: self.model,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mosaic_rejects_length_mismatch() {
        let err = Mosaic::new(4, 4, vec![0.0; 15]).unwrap_err();
        assert!(matches!(err, ConversionError::InvalidDimensions(4, 4)));
    }

    #[test]
    fn even_crop_drops_trailing_row_and_column() {
        let mosaic = Mosaic::from_fn(5, 3, |row, col| (row * 10 + col) as f32);
        let cropped = mosaic.even_cropped();
        assert_eq!((cropped.width(), cropped.height()), (4, 2));
        assert_eq!(cropped.data(), &[0.0, 1.0, 2.0, 3.0, 10.0, 11.0, 12.0, 13.0]);
    }

    #[test]
    fn unknown_channel_code_is_unsupported() {
        let err = CfaPattern::new([[0, 1], [4, 2]]).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedSensor(_)));
    }

    #[test]
    fn alternate_green_folds_into_green() {
        let pattern = CfaPattern::rggb();
        assert_eq!(pattern.code_at(1, 0), 3);
        assert_eq!(pattern.channel_at(1, 0), 1);
        assert_eq!(pattern.normalized().tile(), [[0, 1], [1, 2]]);
        assert_eq!(pattern.to_string(), "RGGB");
        assert_eq!(CfaPattern::gbrg().to_string(), "GBRG");
    }

    #[test]
    fn builder_normalizes_white_balance_and_resolves_matrix() {
        let mosaic = Mosaic::from_fn(4, 4, |_, _| 0.0);
        let frame = RawFrame::builder(mosaic, CfaPattern::rggb())
            .white_balance(&[2.0, 2.0, 3.0])
            .sensor_matrix(Some(SensorMatrix::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])))
            .camera("Acme", "One")
            .build();

        assert_eq!(frame.white_balance(), &[1.0, 1.0, 1.5, 1.0]);
        assert!(frame.color_transform().is_some());
        assert!(frame.summary().contains("Camera: Acme One"));
    }
}
