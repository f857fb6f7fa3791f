use std::io::Write;

use tiff::encoder::colortype::{Gray8, RGB8};
use tiff::encoder::compression::DeflateLevel;
use tiff::encoder::{Compression, TiffEncoder};
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::export::exporter::{ImageExporter, quantize_to_u8};
use crate::image_pipeline::export::types::{ExportConfig, TiffCompression};
use crate::image_pipeline::render::StageImage;

/// Writes mosaic stages as 8-bit grayscale and RGB stages as 8-bit RGB TIFF.
pub struct TiffExporter;

impl ImageExporter for TiffExporter {
    fn export(&self, image: &StageImage, output: &mut dyn Write, config: &ExportConfig) -> Result<()> {
        let (width, height) = (image.width(), image.height());
        debug!("Encoding TIFF image: {}x{}x{}", width, height, image.channels());

        let mut buffer = Vec::new();

        let compression = match config.compression {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        };

        let mut encoder = TiffEncoder::new(std::io::Cursor::new(&mut buffer))
            .map_err(|e| ConversionError::EncodeError(e.to_string()))?
            .with_compression(compression);

        let pixels = quantize_to_u8(image.samples());
        let written = match image {
            StageImage::Mosaic(_) => encoder.write_image::<Gray8>(width as u32, height as u32, &pixels),
            StageImage::Rgb(_) => encoder.write_image::<RGB8>(width as u32, height as u32, &pixels),
        };
        written.map_err(|e| ConversionError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;

        debug!("TIFF encoding complete, {} bytes", buffer.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::debayer::RgbImage;
    use crate::image_pipeline::raw::types::Mosaic;

    #[test]
    fn rgb_stage_round_trips_through_the_decoder() {
        let image = StageImage::Rgb(RgbImage::from_parts(2, 1, vec![0.0, 0.5, 1.0, 1.0, 0.0, 0.25]));
        let mut bytes = Vec::new();
        TiffExporter.export(&image, &mut bytes, &ExportConfig::default()).unwrap();

        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (2, 1));
        match decoder.read_image().unwrap() {
            tiff::decoder::DecodingResult::U8(data) => assert_eq!(data, vec![0, 127, 255, 255, 0, 63]),
            _ => panic!("expected 8-bit samples"),
        }
    }

    #[test]
    fn mosaic_stage_is_written_as_grayscale() {
        let mosaic = Mosaic::new(2, 2, vec![0.0, 0.25, 0.5, 1.0]).unwrap();
        let mut bytes = Vec::new();
        let config = ExportConfig::builder().compression(TiffCompression::Lzw).build();
        TiffExporter.export(&StageImage::Mosaic(mosaic), &mut bytes, &config).unwrap();

        let mut decoder = tiff::decoder::Decoder::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(decoder.colortype().unwrap(), tiff::ColorType::Gray(8));
    }
}
