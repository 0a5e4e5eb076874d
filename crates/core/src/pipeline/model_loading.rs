use std::path::PathBuf;

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::classification::infrastructure::onnx_mask_classifier::OnnxMaskClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::model_resolver::{self, ModelSource, ProgressFn};
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;

/// Directories searched for model files before the user cache: the
/// working directory, its `models/` folder and the executable's directory.
pub fn default_search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join("models"));
        dirs.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
    {
        dirs.push(exe_dir);
    }
    dirs
}

pub fn load_face_detector(
    source: &ModelSource,
    confidence: f64,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving face detector: {}", source.name);
    let path = model_resolver::resolve(source, progress)?;
    Ok(Box::new(OnnxBlazefaceDetector::new(&path, confidence)?))
}

pub fn load_mask_classifier(
    source: &ModelSource,
    progress: Option<ProgressFn>,
) -> Result<Box<dyn MaskClassifier>, Box<dyn std::error::Error>> {
    log::info!("Resolving mask model: {}", source.name);
    let path = model_resolver::resolve(source, progress)?;
    Ok(Box::new(OnnxMaskClassifier::new(&path)?))
}
