use bayer::CFA;

use crate::image_pipeline::raw::types::CfaPattern;

/// The four canonical Bayer phase layouts the interpolation backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BayerLayout {
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
    Unsupported,
}

impl BayerLayout {
    /// Classifies a CFA tile after folding the alternate green into green.
    pub fn from_pattern(pattern: &CfaPattern) -> Self {
        match pattern.normalized().tile() {
            [[0, 1], [1, 2]] => Self::Rggb,
            [[2, 1], [1, 0]] => Self::Bggr,
            [[1, 0], [2, 1]] => Self::Grbg,
            [[1, 2], [0, 1]] => Self::Gbrg,
            _ => Self::Unsupported,
        }
    }

    pub fn bayer_cfa(self) -> Option<CFA> {
        match self {
            Self::Rggb => Some(CFA::RGGB),
            Self::Bggr => Some(CFA::BGGR),
            Self::Grbg => Some(CFA::GRBG),
            Self::Gbrg => Some(CFA::GBRG),
            Self::Unsupported => None,
        }
    }
}
