use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detection::infrastructure::onnx_blazeface_detector::DEFAULT_CONFIDENCE;
use crate::shared::constants::{
    DEFAULT_MASK_THRESHOLD, DEFAULT_MIN_FACE_SIZE, STREAM_JPEG_QUALITY, UPLOAD_JPEG_QUALITY,
};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// What the pipeline does when the mask model is unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fallback {
    /// Classify with random probabilities and flag the report as a demo.
    #[default]
    Demo,
    /// Skip classification and draw a "Model not loaded" banner.
    Banner,
}

/// Tunables for detection, classification and encoding.
///
/// Every field has a default, so a partial JSON document such as
/// `{"threshold": 0.6}` is a valid settings file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectionSettings {
    pub threshold: f32,
    pub min_face_size: u32,
    pub detector_confidence: f64,
    pub upload_jpeg_quality: u8,
    pub stream_jpeg_quality: u8,
    pub fallback: Fallback,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MASK_THRESHOLD,
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            detector_confidence: DEFAULT_CONFIDENCE,
            upload_jpeg_quality: UPLOAD_JPEG_QUALITY,
            stream_jpeg_quality: STREAM_JPEG_QUALITY,
            fallback: Fallback::default(),
        }
    }
}

impl DetectionSettings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded detection settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(SettingsError::Invalid(format!(
                "threshold must be between 0 and 1 (exclusive), got {}",
                self.threshold
            )));
        }
        if !(self.detector_confidence > 0.0 && self.detector_confidence < 1.0) {
            return Err(SettingsError::Invalid(format!(
                "detector_confidence must be between 0 and 1 (exclusive), got {}",
                self.detector_confidence
            )));
        }
        if self.min_face_size == 0 {
            return Err(SettingsError::Invalid(
                "min_face_size must be at least 1".to_string(),
            ));
        }
        for (name, quality) in [
            ("upload_jpeg_quality", self.upload_jpeg_quality),
            ("stream_jpeg_quality", self.stream_jpeg_quality),
        ] {
            if !(1..=100).contains(&quality) {
                return Err(SettingsError::Invalid(format!(
                    "{name} must be between 1 and 100, got {quality}"
                )));
            }
        }
        Ok(())
    }
}
