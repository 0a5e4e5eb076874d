use std::fmt;

use serde::Serialize;

/// Outcome category for one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MaskLabel {
    #[serde(rename = "Mask")]
    Mask,
    #[serde(rename = "No Mask")]
    NoMask,
    #[serde(rename = "Error")]
    Error,
}

impl MaskLabel {
    /// Render color (RGB) for boxes and captions.
    pub fn color(&self) -> [u8; 3] {
        match self {
            MaskLabel::Mask => [100, 220, 80],
            MaskLabel::NoMask => [255, 60, 60],
            MaskLabel::Error => [200, 200, 200],
        }
    }
}

impl fmt::Display for MaskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskLabel::Mask => write!(f, "Mask"),
            MaskLabel::NoMask => write!(f, "No Mask"),
            MaskLabel::Error => write!(f, "Error"),
        }
    }
}

/// A thresholded classifier result. `confidence` is always in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaskVerdict {
    pub label: MaskLabel,
    pub confidence: f32,
}

impl MaskVerdict {
    /// Maps the "no mask" probability to a label.
    ///
    /// `probability < threshold` is a mask with confidence `1 - p`;
    /// anything else (including exactly the threshold) is no mask with
    /// confidence `p`.
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        if probability.is_nan() {
            return Self::error();
        }
        let p = probability.clamp(0.0, 1.0);
        if p < threshold {
            Self {
                label: MaskLabel::Mask,
                confidence: 1.0 - p,
            }
        } else {
            Self {
                label: MaskLabel::NoMask,
                confidence: p,
            }
        }
    }

    pub fn error() -> Self {
        Self {
            label: MaskLabel::Error,
            confidence: 0.0,
        }
    }

    /// `"<label> <percent>%"`, e.g. `"No Mask 87%"`.
    pub fn caption(&self) -> String {
        format!("{} {}%", self.label, (self.confidence * 100.0).round() as i32)
    }
}
