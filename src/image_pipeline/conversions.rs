//! Pipeline conversions module
//!
//! This module contains orchestration logic from RAW bytes to exported stages.

mod raw_to_stage;


pub use raw_to_stage::{RawToStagePipeline, stage_file_name};
