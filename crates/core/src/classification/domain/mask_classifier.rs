use crate::shared::frame::Frame;

/// Domain interface for the mask classifier.
///
/// Returns the probability that the face is *not* masked, in `[0, 1]`.
/// Implementations resize and normalize the crop themselves.
pub trait MaskClassifier: Send {
    fn predict(&mut self, face: &Frame) -> Result<f32, Box<dyn std::error::Error>>;

    /// Model input shape for status reporting, if known.
    fn input_shape(&self) -> Option<Vec<i64>> {
        None
    }

    /// True for stand-in classifiers that do not run a real model.
    fn is_demo(&self) -> bool {
        false
    }
}
