//! Types for debayering operations

use crate::image_pipeline::common::buffer::PixelBuffer;
use crate::image_pipeline::tone::NORMALIZE_EPSILON;

/// RGB image data after debayering
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    width: usize,
    height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    data: Vec<f32>,
}

impl RgbImage {
    /// Wraps interleaved samples. The length is not checked here; buffers coming
    /// from outside the crate are validated by the demosaic strategy.
    pub fn from_parts(width: usize, height: usize, data: Vec<f32>) -> Self {
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

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f32; 3] {
        let idx = (y * self.width + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Rescales each channel independently: subtract the channel minimum, then
    /// divide by the remaining maximum unless the channel is flat.
    pub fn normalized_per_channel(&self) -> RgbImage {
        let mut data = self.data.clone();
        for channel in 0..3 {
            let (lo, hi) = data
                .iter()
                .skip(channel)
                .step_by(3)
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let range = hi - lo;
            for v in data.iter_mut().skip(channel).step_by(3) {
                *v -= lo;
                if range > NORMALIZE_EPSILON {
                    *v /= range;
                }
            }
        }
        RgbImage { width: self.width, height: self.height, data }
    }
}

impl PixelBuffer for RgbImage {
    fn samples(&self) -> &[f32] {
        &self.data
    }

    fn with_samples(&self, samples: Vec<f32>) -> Self {
        debug_assert_eq!(samples.len(), self.data.len());
        RgbImage {
            width: self.width,
            height: self.height,
            data: samples,
        }
    }
}
