//! Tone mapping: exposure normalization, gamma encoding and the dual-gain
//! diagnostic view.
//!
//! Every function here is pure and returns a new buffer.

use crate::image_pipeline::common::buffer::PixelBuffer;
use crate::image_pipeline::raw::types::Mosaic;

/// Floor for the divisor when a buffer has (almost) no range.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Percentile at which the low-gain copy is hard clipped.
const LOW_GAIN_CLIP_PERCENTILE: f32 = 95.0;
/// Percentile above which the high-gain copy keeps signal.
const HIGH_GAIN_FLOOR_PERCENTILE: f32 = 30.0;
const HIGH_GAIN: f32 = 2.0;

/// Shifts the global minimum to 0 and scales the global maximum to 1.
///
/// A flat buffer becomes all zeros rather than dividing by zero. Applying it
/// twice gives the same result as applying it once.
pub fn normalize_exposure<B: PixelBuffer>(image: &B) -> B {
    if image.samples().is_empty() {
        return image.with_samples(Vec::new());
    }
    let (lo, hi) = image.min_max();
    let range = (hi - lo).max(NORMALIZE_EPSILON);
    let samples = image.samples().iter().map(|&v| (v - lo) / range).collect();
    image.with_samples(samples)
}

/// Clips to [0, 1] and raises to `1 / gamma`. A gamma that is not a finite
/// positive number returns the input unchanged.
pub fn gamma_encode<B: PixelBuffer>(image: &B, gamma: f32) -> B {
    if !gamma.is_finite() || gamma <= 0.0 {
        return image.with_samples(image.samples().to_vec());
    }
    let exponent = 1.0 / gamma;
    let samples = image
        .samples()
        .iter()
        .map(|&v| v.clamp(0.0, 1.0).powf(exponent))
        .collect();
    image.with_samples(samples)
}

/// Diagnostic blend of a low-gain copy clipped at the 95th percentile and a
/// doubled high-gain copy of everything above the 30th percentile.
pub fn dual_gain_view(mosaic: &Mosaic) -> Mosaic {
    let samples = mosaic.samples();
    let clip = percentile(samples, LOW_GAIN_CLIP_PERCENTILE);
    let floor = percentile(samples, HIGH_GAIN_FLOOR_PERCENTILE);
    let blended = samples
        .iter()
        .map(|&v| v.clamp(0.0, clip.max(0.0)) + (v - floor).max(0.0) * HIGH_GAIN)
        .collect();
    normalize_exposure(&mosaic.with_samples(blended))
}

/// Adds a doubled copy of the signal above `threshold` and renormalizes.
pub fn dual_gain_curve(mosaic: &Mosaic, threshold: f32) -> Mosaic {
    let boosted = mosaic
        .samples()
        .iter()
        .map(|&v| v + (v - threshold).max(0.0) * HIGH_GAIN)
        .collect();
    normalize_exposure(&mosaic.with_samples(boosted))
}

/// Percentile `p` (0..=100) with linear interpolation between closest ranks.
/// Returns 0.0 for an empty slice.
pub fn percentile(samples: &[f32], p: f32) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable_by(f32::total_cmp);

    let rank = (p.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f32;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
