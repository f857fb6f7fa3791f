//! Debayering module for converting Bayer mosaics to RGB
//!
//! Two interchangeable strategies sit behind the [`Demosaicer`] trait:
//! a fast bilinear path through the `bayer` crate, and an adaptive path
//! delegated to a [`RawDeveloper`] (LibRaw AHD by default).

pub mod adaptive;
pub mod bilinear;
pub mod layout;
pub mod libraw;
pub mod ppg;
pub mod types;

use std::fmt;

use crate::image_pipeline::common::error::Result;
use crate::image_pipeline::raw::types::{Mosaic, RawFrame};

pub use adaptive::{AdaptiveDemosaicer, DevelopParams, RawDeveloper};
pub use bilinear::BilinearDemosaicer;
pub use layout::BayerLayout;
pub use libraw::LibRawDeveloper;
pub use ppg::PpgDeveloper;
pub use types::RgbImage;

/// Reconstructs a full RGB image from a (possibly corrected) mosaic.
///
/// `mosaic` is the stage engine output for `frame`; implementations read the
/// CFA layout and sensor metadata from `frame` and never modify either.
pub trait Demosaicer {
    fn name(&self) -> &'static str;

    fn demosaic(&self, frame: &RawFrame, mosaic: &Mosaic) -> Result<RgbImage>;
}

/// Demosaic strategy selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DemosaicAlgorithm {
    /// Bilinear interpolation, canonical Bayer layouts only.
    #[default]
    Bilinear,
    /// AHD reconstruction through LibRaw.
    Adaptive,
}

impl DemosaicAlgorithm {
    pub fn demosaicer(self) -> Box<dyn Demosaicer> {
        match self {
            Self::Bilinear => Box::new(BilinearDemosaicer),
            Self::Adaptive => Box::new(AdaptiveDemosaicer::default()),
        }
    }
}

impl fmt::Display for DemosaicAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bilinear => f.write_str("Bilinear"),
            Self::Adaptive => f.write_str("Adaptive (AHD)"),
        }
    }
}
