//! RAW frame loading module
//!
//! This module provides format-agnostic RAW reading and the immutable
//! [`RawFrame`] every pipeline stage reads from.

mod reader;
mod rawloader_reader;
pub mod types;

pub use reader::RawFrameReader;
pub use rawloader_reader::RawLoaderReader;
pub use types::{CfaPattern, Mosaic, RawFrame, RawFrameBuilder, SensorMatrix};
