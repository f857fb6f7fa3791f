//! Image export module
//!
//! Quantizes a rendered stage to 8 bits and writes it as TIFF.

mod exporter;
mod tiff_exporter;
pub mod types;

pub use exporter::{ImageExporter, quantize_to_u8};
pub use tiff_exporter::TiffExporter;
pub use types::{ExportConfig, ExportConfigBuilder, TiffCompression};
