/// Shared view over the flat `f32` sample storage of every pipeline image.
///
/// Tone operations only care about the samples, not about how many channels
/// they are interleaved into, so they are written once against this trait.
pub trait PixelBuffer: Sized {
    fn samples(&self) -> &[f32];

    /// Builds an image with the same geometry around a new sample vector.
    /// `samples` must have the same length as `self.samples()`.
    fn with_samples(&self, samples: Vec<f32>) -> Self;

    fn min_max(&self) -> (f32, f32) {
        self.samples()
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}
