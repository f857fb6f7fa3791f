use std::io::Write;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::export::types::ExportConfig;
use crate::image_pipeline::render::StageImage;

/// Sink for rendered stages. Input samples are always within [0, 1].
pub trait ImageExporter {
    fn export(&self, image: &StageImage, output: &mut dyn Write, config: &ExportConfig) -> Result<()>;
}

/// Maps [0, 1] samples onto 0..=255, clipping anything outside.
pub fn quantize_to_u8(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .map(|&v| (v * 255.0).clamp(0.0, 255.0) as u8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization_clips_and_truncates() {
        assert_eq!(quantize_to_u8(&[-0.5, 0.0, 0.5, 1.0, 2.0]), vec![0, 0, 127, 255, 255]);
    }
}
