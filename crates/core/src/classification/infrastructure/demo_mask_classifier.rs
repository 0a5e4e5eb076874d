use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::shared::frame::Frame;

/// Stand-in used when the mask model cannot be loaded.
///
/// Produces random probabilities so the rest of the pipeline (detection,
/// drawing, JSON) can still be demonstrated.
pub struct DemoMaskClassifier {
    rng: StdRng,
}

impl DemoMaskClassifier {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for DemoMaskClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MaskClassifier for DemoMaskClassifier {
    fn predict(&mut self, _face: &Frame) -> Result<f32, Box<dyn std::error::Error>> {
        Ok(self.rng.gen_range(0.0..=1.0))
    }

    fn is_demo(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Frame {
        Frame::new(vec![0u8; 8 * 8 * 3], 8, 8, 3, 0)
    }

    #[test]
    fn test_predictions_in_unit_range() {
        let mut classifier = DemoMaskClassifier::new();
        for _ in 0..200 {
            let p = classifier.predict(&face()).unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn test_seeded_is_reproducible() {
        let mut a = DemoMaskClassifier::seeded(7);
        let mut b = DemoMaskClassifier::seeded(7);
        for _ in 0..10 {
            assert_eq!(a.predict(&face()).unwrap(), b.predict(&face()).unwrap());
        }
    }

    #[test]
    fn test_reports_demo() {
        let classifier = DemoMaskClassifier::seeded(1);
        assert!(classifier.is_demo());
        assert!(classifier.input_shape().is_none());
    }
}
