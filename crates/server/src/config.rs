use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use maskwatch_core::pipeline::detection_settings::{DetectionSettings, SettingsError};
use maskwatch_core::shared::constants::{DETECTOR_MODEL_NAME, MASK_MODEL_NAME};

/// Face mask detection web demo.
#[derive(Parser, Debug)]
#[command(name = "maskwatch-server", version)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "MASKWATCH_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Mask classifier model (ONNX).
    #[arg(long, env = "MASKWATCH_MODEL", default_value = MASK_MODEL_NAME)]
    pub model: PathBuf,

    /// Download location for the mask model when it is not found locally.
    #[arg(long, env = "MASKWATCH_MODEL_URL")]
    pub model_url: Option<String>,

    /// Face detector model (BlazeFace ONNX).
    #[arg(long, env = "MASKWATCH_DETECTOR", default_value = DETECTOR_MODEL_NAME)]
    pub detector: PathBuf,

    /// Download location for the face detector.
    #[arg(long, env = "MASKWATCH_DETECTOR_URL")]
    pub detector_url: Option<String>,

    /// TrueType font for captions and banners.
    #[arg(long, env = "MASKWATCH_FONT")]
    pub font: Option<PathBuf>,

    /// Capture device for /video_feed (default: first camera).
    #[arg(long, env = "MASKWATCH_CAMERA")]
    pub camera_device: Option<String>,

    /// Never open a server-side camera.
    #[arg(long, env = "MASKWATCH_DISABLE_CAMERA")]
    pub disable_camera: bool,

    /// JSON file with detection settings.
    #[arg(long, env = "MASKWATCH_SETTINGS")]
    pub settings: Option<PathBuf>,

    /// Override the mask probability threshold (0.0-1.0, exclusive).
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Override the minimum face width/height in pixels.
    #[arg(long)]
    pub min_face_size: Option<u32>,
}

impl ServerArgs {
    /// Settings file (or defaults) with command-line overrides applied.
    pub fn detection_settings(&self) -> Result<DetectionSettings, SettingsError> {
        let mut settings = match &self.settings {
            Some(path) => DetectionSettings::load(path)?,
            None => DetectionSettings::default(),
        };
        if let Some(threshold) = self.threshold {
            settings.threshold = threshold;
        }
        if let Some(min_face_size) = self.min_face_size {
            settings.min_face_size = min_face_size;
        }
        settings.validate()?;
        Ok(settings)
    }
}
