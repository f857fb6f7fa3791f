use tracing::debug;

use crate::image_pipeline::bayer_stage::apply_white_balance;
use crate::image_pipeline::common::error::{ConversionError, Result};
use crate::image_pipeline::debayer::{DevelopParams, RawDeveloper, RgbImage};
use crate::image_pipeline::raw::types::{CfaPattern, Mosaic, RawFrame};
use crate::image_pipeline::tone::percentile;

const RED: usize = 0;
const GREEN: usize = 1;
const BLUE: usize = 2;

/// Share of pixels allowed to clip when `auto_bright` is enabled.
const AUTO_BRIGHT_PERCENTILE: f32 = 99.0;

/// In-crate raw developer using Patterned Pixel Grouping.
///
/// Fallback for frames LibRaw cannot develop because they carry no encoded
/// source, such as synthetic or already decoded mosaics.
///
/// Two passes:
/// 1. Green at red/blue sites, interpolated along the direction with the
///    lower gradient, with a Laplacian correction from the site's own channel.
/// 2. Red and blue from color differences (value - green) of neighbours where
///    the target channel was sampled.
///
/// Works on any 2x2 tile, not only the canonical Bayer layouts.
pub struct PpgDeveloper;

impl RawDeveloper for PpgDeveloper {
    fn reconstruct(&self, frame: &RawFrame, mosaic: &Mosaic, params: &DevelopParams) -> Result<RgbImage> {
        let pattern = frame.pattern();
        let width = mosaic.width();
        let height = mosaic.height();
        if width == 0 || height == 0 {
            return Err(ConversionError::InvalidDimensions(width, height));
        }

        let levels = ((1u64 << params.output_bits.clamp(1, 32)) - 1) as f32;
        let scale = levels / frame.white_level();
        debug!(
            "PPG develop {}x{}: {} levels, scale {}, params {:?}",
            width, height, levels, scale, params
        );

        let balanced;
        let source = if params.use_camera_wb {
            balanced = apply_white_balance(mosaic, frame.white_balance(), pattern);
            &balanced
        } else {
            mosaic
        };
        let input: Vec<f32> = source.data().iter().map(|&v| v * scale).collect();

        let green = interpolate_green(&input, width, height, pattern);
        let mut rgb = interpolate_red_blue(&input, &green, width, height, pattern);

        if params.auto_bright {
            let bright = percentile(&rgb, AUTO_BRIGHT_PERCENTILE);
            if bright > 0.0 {
                let gain = levels / bright;
                rgb.iter_mut().for_each(|v| *v *= gain);
            }
        }

        let encode = params.output_gamma > 0.0 && params.output_gamma != 1.0;
        for v in rgb.iter_mut() {
            let mut linear = v.clamp(0.0, levels);
            if encode {
                linear = levels * (linear / levels).powf(1.0 / params.output_gamma);
            }
            *v = linear.round();
        }

        Ok(RgbImage::from_parts(width, height, rgb))
    }
}

#[inline]
fn sample(input: &[f32], width: usize, height: usize, y: usize, x: usize, dy: i32, dx: i32) -> f32 {
    let ny = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
    let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
    input[ny * width + nx]
}

fn interpolate_green(input: &[f32], width: usize, height: usize, pattern: &CfaPattern) -> Vec<f32> {
    let mut green = vec![0.0f32; width * height];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if pattern.channel_at(y, x) == GREEN {
                green[idx] = input[idx];
                continue;
            }

            let at = |dy, dx| sample(input, width, height, y, x, dy, dx);
            let center = input[idx];
            let (g_left, g_right, g_top, g_bot) = (at(0, -1), at(0, 1), at(-1, 0), at(1, 0));
            let lap_h = 2.0 * center - at(0, -2) - at(0, 2);
            let lap_v = 2.0 * center - at(-2, 0) - at(2, 0);

            let h_grad = (g_left - g_right).abs() + lap_h.abs();
            let v_grad = (g_top - g_bot).abs() + lap_v.abs();

            let g_h = (g_left + g_right) * 0.5 + lap_h * 0.25;
            let g_v = (g_top + g_bot) * 0.5 + lap_v * 0.25;

            green[idx] = if h_grad < v_grad {
                g_h
            } else if v_grad < h_grad {
                g_v
            } else {
                (g_h + g_v) * 0.5
            };
        }
    }
    green
}

fn interpolate_red_blue(
    input: &[f32],
    green: &[f32],
    width: usize,
    height: usize,
    pattern: &CfaPattern,
) -> Vec<f32> {
    let mut rgb = vec![0.0f32; width * height * 3];

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let out = &mut rgb[idx * 3..idx * 3 + 3];
            let ch = pattern.channel_at(y, x);

            out[GREEN] = green[idx];
            out[ch] = input[idx];

            match ch {
                GREEN => {
                    let row_color = pattern.channel_at(y, x + 1);
                    let col_color = pattern.channel_at(y + 1, x);
                    if row_color != GREEN {
                        out[row_color] = green[idx] + cardinal_difference(input, green, width, height, y, x, true);
                    }
                    if col_color != GREEN && col_color != row_color {
                        out[col_color] = green[idx] + cardinal_difference(input, green, width, height, y, x, false);
                    }
                }
                _ => {
                    let target = if ch == RED { BLUE } else { RED };
                    out[target] = green[idx] + diagonal_difference(input, green, width, height, pattern, y, x, target);
                }
            }
        }
    }
    rgb
}

/// Mean color difference (input - green) of the two neighbours along one axis.
#[inline]
fn cardinal_difference(
    input: &[f32],
    green: &[f32],
    width: usize,
    height: usize,
    y: usize,
    x: usize,
    horizontal: bool,
) -> f32 {
    let (i0, i1) = if horizontal {
        (y * width + x.saturating_sub(1), y * width + (x + 1).min(width - 1))
    } else {
        (y.saturating_sub(1) * width + x, (y + 1).min(height - 1) * width + x)
    };
    ((input[i0] - green[i0]) + (input[i1] - green[i1])) * 0.5
}

/// Mean color difference of the diagonal neighbours sampled in `target`.
#[allow(clippy::too_many_arguments)]
#[inline]
fn diagonal_difference(
    input: &[f32],
    green: &[f32],
    width: usize,
    height: usize,
    pattern: &CfaPattern,
    y: usize,
    x: usize,
    target: usize,
) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for (dy, dx) in [(-1i32, -1i32), (-1, 1), (1, -1), (1, 1)] {
        let ny = (y as i32 + dy).clamp(0, height as i32 - 1) as usize;
        let nx = (x as i32 + dx).clamp(0, width as i32 - 1) as usize;
        if pattern.channel_at(ny, nx) == target {
            let nidx = ny * width + nx;
            sum += input[nidx] - green[nidx];
            count += 1;
        }
    }
    if count > 0 { sum / count as f32 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVELS: f32 = 65535.0;

    fn solid_frame(pattern: CfaPattern, rgb: [f32; 3], size: usize) -> RawFrame {
        let mosaic = Mosaic::from_fn(size, size, |y, x| rgb[pattern.channel_at(y, x)]);
        RawFrame::builder(mosaic, pattern).white_level(LEVELS).build()
    }

    #[test]
    fn sampled_channel_is_preserved() {
        for pattern in [CfaPattern::rggb(), CfaPattern::bggr(), CfaPattern::grbg(), CfaPattern::gbrg()] {
            let frame = solid_frame(pattern, [800.0, 500.0, 300.0], 16);
            let rgb = PpgDeveloper.reconstruct(&frame, frame.mosaic(), &DevelopParams::default()).unwrap();
            for y in 0..16 {
                for x in 0..16 {
                    let ch = pattern.channel_at(y, x);
                    assert_eq!(rgb.pixel(x, y)[ch], frame.mosaic().get(y, x), "{pattern} at ({y},{x})");
                }
            }
        }
    }

    #[test]
    fn uniform_color_is_reconstructed_in_the_interior() {
        for pattern in [CfaPattern::rggb(), CfaPattern::bggr(), CfaPattern::grbg(), CfaPattern::gbrg()] {
            let frame = solid_frame(pattern, [800.0, 500.0, 300.0], 16);
            let rgb = PpgDeveloper.reconstruct(&frame, frame.mosaic(), &DevelopParams::default()).unwrap();
            for y in 3..13 {
                for x in 3..13 {
                    let [r, g, b] = rgb.pixel(x, y);
                    assert!((r - 800.0).abs() <= 1.0, "{pattern} R at ({y},{x}) = {r}");
                    assert!((g - 500.0).abs() <= 1.0, "{pattern} G at ({y},{x}) = {g}");
                    assert!((b - 300.0).abs() <= 1.0, "{pattern} B at ({y},{x}) = {b}");
                }
            }
        }
    }

    #[test]
    fn output_is_quantized_to_the_requested_depth() {
        let frame = solid_frame(CfaPattern::rggb(), [70000.0, 12.3, 0.6], 8);
        let params = DevelopParams { output_bits: 8, ..DevelopParams::default() };
        let rgb = PpgDeveloper.reconstruct(&frame, frame.mosaic(), &params).unwrap();
        assert!(rgb.data().iter().all(|&v| (0.0..=255.0).contains(&v) && v.fract() == 0.0));
    }

    #[test]
    fn camera_white_balance_is_applied_only_on_request() {
        let mosaic = Mosaic::from_fn(8, 8, |_, _| 100.0);
        let frame = RawFrame::builder(mosaic, CfaPattern::rggb())
            .white_balance(&[2.0, 1.0, 1.0, 1.0])
            .white_level(LEVELS)
            .build();

        let plain = PpgDeveloper.reconstruct(&frame, frame.mosaic(), &DevelopParams::default()).unwrap();
        let params = DevelopParams { use_camera_wb: true, ..DevelopParams::default() };
        let balanced = PpgDeveloper.reconstruct(&frame, frame.mosaic(), &params).unwrap();

        assert_eq!(plain.pixel(0, 0)[0], 100.0);
        assert_eq!(balanced.pixel(0, 0)[0], 200.0);
    }
}
