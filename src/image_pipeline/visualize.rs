//! Debug views over a demosaiced image.

use crate::image_pipeline::debayer::RgbImage;
use crate::image_pipeline::raw::types::CfaPattern;
use crate::image_pipeline::tone::normalize_exposure;

const OVERLAY_OPACITY: f32 = 0.3;
const ERROR_GAIN: f32 = 5.0;

/// Tints every pixel toward the primary of the channel its photosite sampled,
/// so each 2x2 block shows the CFA tile over the image.
pub fn draw_bayer_grid(image: &RgbImage, pattern: &CfaPattern) -> RgbImage {
    let width = image.width();
    let data = image
        .data()
        .chunks_exact(3)
        .enumerate()
        .flat_map(|(i, px)| {
            let sampled = pattern.channel_at(i / width, i % width);
            let mut out = [0.0f32; 3];
            for (c, v) in out.iter_mut().enumerate() {
                let primary = if c == sampled { 1.0 } else { 0.0 };
                *v = primary * OVERLAY_OPACITY + px[c] * (1.0 - OVERLAY_OPACITY);
            }
            out
        })
        .collect();
    RgbImage::from_parts(width, image.height(), data)
}

/// False-color map of |R - G| (red) and |B - G| (green), amplified and
/// renormalized. Interpolation artifacts show up as bright fringes.
pub fn demosaic_error_view(image: &RgbImage) -> RgbImage {
    let data = image
        .data()
        .chunks_exact(3)
        .flat_map(|px| {
            let (r, g, b) = (px[0], px[1], px[2]);
            [(r - g).abs() * ERROR_GAIN, (b - g).abs() * ERROR_GAIN, 0.0]
        })
        .collect();
    normalize_exposure(&RgbImage::from_parts(image.width(), image.height(), data))
}
