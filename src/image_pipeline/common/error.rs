use thiserror::Error;

use crate::image_pipeline::raw::types::CfaPattern;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Failed to read input file: {0}")]
    InputReadError(String),

    #[error("Failed to write output file: {0}")]
    OutputWriteError(String),

    #[error("Failed to decode RAW image: {0}")]
    DecodeError(String),

    #[error("Unsupported sensor layout: {0}")]
    UnsupportedSensor(String),

    #[error("Unsupported Bayer pattern: {0}")]
    UnsupportedPattern(CfaPattern),

    #[error("Demosaic failed: {0}")]
    DemosaicError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Invalid image dimensions: width={0}, height={1}")]
    InvalidDimensions(usize, usize),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConversionError>;
