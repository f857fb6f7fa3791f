//! Mosaic-domain corrections: black level subtraction and white balance.
//!
//! Both walk the four phases of the 2x2 CFA tile and scale or offset every
//! photosite of a phase by the value for that phase's channel code. The
//! source mosaic is never modified; each call returns a fresh copy.

use tracing::warn;

use crate::image_pipeline::raw::types::{CFA_GREEN, CFA_GREEN_ALT, CfaPattern, Mosaic};
use crate::image_pipeline::common::buffer::PixelBuffer;

/// Subtracts the per-channel black level from every photosite, clipping at zero.
pub fn subtract_black(mosaic: &Mosaic, black_levels: &[f32; 4], pattern: &CfaPattern) -> Mosaic {
    map_phases(mosaic, pattern, |value, code| (value - black_levels[code]).max(0.0))
}

/// Multiplies every photosite by its channel's white balance gain, clipping at zero.
pub fn apply_white_balance(mosaic: &Mosaic, multipliers: &[f32; 4], pattern: &CfaPattern) -> Mosaic {
    map_phases(mosaic, pattern, |value, code| (value * multipliers[code]).max(0.0))
}

fn map_phases(mosaic: &Mosaic, pattern: &CfaPattern, op: impl Fn(f32, usize) -> f32) -> Mosaic {
    let width = mosaic.width();
    let mut out = mosaic.samples().to_vec();
    for phase_row in 0..2 {
        for phase_col in 0..2 {
            let code = pattern.code_at(phase_row, phase_col);
            for row in (phase_row..mosaic.height()).step_by(2) {
                for col in (phase_col..width).step_by(2) {
                    let idx = row * width + col;
                    out[idx] = op(out[idx], code);
                }
            }
        }
    }
    mosaic.with_samples(out)
}

/// Sanitizes camera white balance multipliers into four gains indexed by
/// channel code, rescaled so the primary green gain is 1.0.
///
/// Missing or unusable gains (non-finite or non-positive) fall back to 1.0,
/// and a three-value set reuses the primary green gain for the alternate green.
pub fn normalize_white_balance(multipliers: &[f32]) -> [f32; 4] {
    if multipliers.len() < 3 {
        warn!("Camera white balance has {} values, expected at least 3", multipliers.len());
    }

    let usable = |v: Option<&f32>| v.copied().filter(|v| v.is_finite() && *v > 0.0);

    let mut wb = [1.0f32; 4];
    for (code, gain) in wb.iter_mut().enumerate().take(3) {
        *gain = usable(multipliers.get(code)).unwrap_or(1.0);
    }
    wb[CFA_GREEN_ALT as usize] =
        usable(multipliers.get(3)).unwrap_or(wb[CFA_GREEN as usize]);

    let green = wb[CFA_GREEN as usize];
    for gain in wb.iter_mut() {
        *gain /= green;
    }
    wb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical_patterns() -> [CfaPattern; 4] {
        [CfaPattern::rggb(), CfaPattern::bggr(), CfaPattern::grbg(), CfaPattern::gbrg()]
    }

    fn ramp(width: usize, height: usize) -> Mosaic {
        Mosaic::from_fn(width, height, |row, col| ((row * width + col) * 37 % 1000) as f32)
    }

    #[test]
    fn black_then_white_balance_never_negative() {
        let black = [64.0, 80.0, 500.0, 90.0];
        let wb = [2.1, 1.0, 1.6, 1.0];
        let mosaic = ramp(9, 7);
        for pattern in canonical_patterns() {
            let balanced = apply_white_balance(&subtract_black(&mosaic, &black, &pattern), &wb, &pattern);
            assert!(balanced.data().iter().all(|&v| v >= 0.0), "negative sample for {pattern}");
        }
    }

    #[test]
    fn both_corrections_share_the_phase_mapping() {
        let mosaic = Mosaic::from_fn(6, 6, |_, _| 1000.0);
        let per_code = [10.0, 20.0, 30.0, 40.0];
        let gains = [1.0, 2.0, 3.0, 4.0];
        for pattern in canonical_patterns() {
            let blacked = subtract_black(&mosaic, &per_code, &pattern);
            let balanced = apply_white_balance(&mosaic, &gains, &pattern);
            for row in 0..6 {
                for col in 0..6 {
                    let code = pattern.code_at(row, col);
                    assert_eq!(blacked.get(row, col), 1000.0 - per_code[code]);
                    assert_eq!(balanced.get(row, col), 1000.0 * gains[code]);
                }
            }
        }
    }

    #[test]
    fn source_mosaic_is_untouched() {
        let mosaic = ramp(4, 4);
        let before = mosaic.clone();
        let _ = subtract_black(&mosaic, &[1000.0; 4], &CfaPattern::rggb());
        let _ = apply_white_balance(&mosaic, &[0.0; 4], &CfaPattern::rggb());
        assert_eq!(mosaic, before);
    }

    #[test]
    fn odd_dimensions_cover_every_photosite() {
        let mosaic = Mosaic::from_fn(5, 3, |_, _| 10.0);
        let out = subtract_black(&mosaic, &[1.0, 2.0, 3.0, 4.0], &CfaPattern::rggb());
        assert!(out.data().iter().all(|&v| v < 10.0));
    }

    #[test]
    fn white_balance_is_rescaled_to_green() {
        assert_eq!(normalize_white_balance(&[2.0, 1.0, 1.5, 1.0]), [2.0, 1.0, 1.5, 1.0]);
        assert_eq!(normalize_white_balance(&[4.0, 2.0, 3.0]), [2.0, 1.0, 1.5, 1.0]);
        assert_eq!(normalize_white_balance(&[4.0, 2.0, 3.0, 4.0]), [2.0, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn unusable_gains_fall_back_to_unity() {
        assert_eq!(normalize_white_balance(&[f32::NAN, 1.0, -2.0, f32::INFINITY]), [1.0; 4]);
        assert_eq!(normalize_white_balance(&[]), [1.0; 4]);
    }
}
