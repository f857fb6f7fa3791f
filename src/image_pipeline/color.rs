//! Sensor color matrix handling.
//!
//! Decoders report the sensor-to-XYZ matrix as 3x3, 3x4 or 4x3. The resolver
//! reduces it to 3x3 and folds in the XYZ to sRGB (D65) conversion. A matrix of
//! any other shape disables color correction instead of failing the load.

use tracing::{debug, warn};

use crate::image_pipeline::debayer::types::RgbImage;
use crate::image_pipeline::raw::types::SensorMatrix;

/// Standard XYZ to sRGB D65 illuminant matrix
pub const XYZ_TO_SRGB: [[f32; 3]; 3] = [
    [ 3.2404542, -1.5371385, -0.4985314],
    [-0.9692660,  1.8760108,  0.0415560],
    [ 0.0556434, -0.2040259,  1.0572252],
];

/// 3x3 sensor to sRGB transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorTransform {
    matrix: [[f32; 3]; 3],
}

impl ColorTransform {
    pub fn matrix(&self) -> &[[f32; 3]; 3] {
        &self.matrix
    }

    /// Applies the transform to every pixel, clipping negative results to zero.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        let m = &self.matrix;
        let data = image
            .data()
            .chunks_exact(3)
            .flat_map(|px| {
                let (r, g, b) = (px[0], px[1], px[2]);
                [
                    (m[0][0] * r + m[0][1] * g + m[0][2] * b).max(0.0),
                    (m[1][0] * r + m[1][1] * g + m[1][2] * b).max(0.0),
                    (m[2][0] * r + m[2][1] * g + m[2][2] * b).max(0.0),
                ]
            })
            .collect();
        RgbImage::from_parts(image.width(), image.height(), data)
    }
}

/// Resolves the decoder's sensor matrix into a sensor to sRGB transform.
///
/// * 3x4 drops the last column
/// * 4x3 drops the last row
/// * 3x3 is used directly
///
/// Any other shape, or a value count that does not match the shape, logs a
/// warning and yields `None`.
pub fn resolve_color_transform(matrix: Option<&SensorMatrix>) -> Option<ColorTransform> {
    let matrix = matrix?;
    let (rows, cols) = matrix.shape();

    if matrix.values().len() != rows * cols {
        warn!(
            "Malformed sensor color matrix: {} values for a {}x{} shape, color correction disabled",
            matrix.values().len(),
            rows,
            cols
        );
        return None;
    }

    match (rows, cols) {
        (3, 3) | (3, 4) | (4, 3) => {}
        _ => {
            warn!("Unexpected sensor color matrix shape {}x{}, color correction disabled", rows, cols);
            return None;
        }
    }

    let mut cam_to_xyz = [[0.0f32; 3]; 3];
    for (r, row) in cam_to_xyz.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            *value = matrix.get(r, c);
        }
    }

    let mut cam_to_srgb = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            cam_to_srgb[r][c] = (0..3).map(|k| XYZ_TO_SRGB[r][k] * cam_to_xyz[k][c]).sum();
        }
    }

    debug!("Resolved {}x{} sensor matrix to sensor->sRGB {:?}", rows, cols, cam_to_srgb);
    Some(ColorTransform { matrix: cam_to_srgb })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAM: [[f32; 3]; 3] = [[0.6, 0.2, 0.1], [0.3, 0.9, -0.1], [0.05, -0.2, 1.1]];

    #[test]
    fn identity_resolves_to_xyz_to_srgb() {
        let identity = SensorMatrix::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let transform = resolve_color_transform(Some(&identity)).unwrap();
        assert_eq!(transform.matrix(), &XYZ_TO_SRGB);
    }

    #[test]
    fn three_by_four_matches_leading_three_by_three() {
        let wide = SensorMatrix::from_rows([
            [CAM[0][0], CAM[0][1], CAM[0][2], 9.0],
            [CAM[1][0], CAM[1][1], CAM[1][2], 9.0],
            [CAM[2][0], CAM[2][1], CAM[2][2], 9.0],
        ]);
        let square = SensorMatrix::from_rows(CAM);
        assert_eq!(
            resolve_color_transform(Some(&wide)),
            resolve_color_transform(Some(&square))
        );
    }

    #[test]
    fn four_by_three_drops_last_row() {
        let tall = SensorMatrix::from_rows([CAM[0], CAM[1], CAM[2], [7.0, 7.0, 7.0]]);
        let square = SensorMatrix::from_rows(CAM);
        assert_eq!(
            resolve_color_transform(Some(&tall)),
            resolve_color_transform(Some(&square))
        );
    }

    #[test]
    fn unexpected_shape_resolves_to_none() {
        let odd = SensorMatrix::from_rows([[1.0f32; 5]; 5]);
        assert!(resolve_color_transform(Some(&odd)).is_none());
        assert!(resolve_color_transform(None).is_none());
    }

    #[test]
    fn value_count_mismatch_resolves_to_none() {
        let broken = SensorMatrix::new(3, 3, vec![1.0; 8]);
        assert!(resolve_color_transform(Some(&broken)).is_none());
    }

    #[test]
    fn apply_clips_negative_output() {
        let transform = ColorTransform { matrix: [[1.0, -2.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]] };
        let image = RgbImage::from_parts(1, 1, vec![0.2, 0.5, 0.3]);
        let out = transform.apply(&image);
        assert_eq!(out.data(), &[0.0, 0.5, 0.3]);
    }
}
