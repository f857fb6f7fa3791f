//! Image processing pipeline module
//!
//! Turns one RAW capture into a viewable image, one inspectable stage at a
//! time: black level, white balance, demosaic, exposure normalization and
//! gamma encoding.

pub mod bayer_stage;
pub mod color;
pub mod common;
pub mod conversions;
pub mod debayer;
pub mod export;
pub mod raw;
pub mod render;
pub mod session;
pub mod tone;
pub mod visualize;

pub use common::{
    ConversionError,
    PixelBuffer,
    Result,
};

pub use raw::{
    CfaPattern,
    Mosaic,
    RawFrame,
    RawFrameReader,
    RawLoaderReader,
    SensorMatrix,
};

pub use color::{ColorTransform, resolve_color_transform};

pub use debayer::{
    BayerLayout,
    DemosaicAlgorithm,
    Demosaicer,
    RgbImage,
};

pub use render::{
    Overlays,
    PipelineStage,
    RenderRequest,
    RenderRequestBuilder,
    StageImage,
    render,
};

pub use session::RenderSession;

pub use export::{
    ExportConfig,
    ExportConfigBuilder,
    ImageExporter,
    TiffCompression,
    TiffExporter,
};

pub use conversions::RawToStagePipeline;
