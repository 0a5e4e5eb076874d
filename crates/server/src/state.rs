use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use maskwatch_core::pipeline::detect_masks_use_case::{DetectMasksUseCase, PipelineStatus};
use maskwatch_core::pipeline::detection_settings::DetectionSettings;
use maskwatch_core::video::domain::video_reader::VideoReader;
use maskwatch_core::video::infrastructure::ffmpeg_camera_reader::FfmpegCameraReader;

use crate::environment::Environment;

/// Builds a fresh reader for each streaming client.
pub type CameraFactory = Arc<dyn Fn() -> Box<dyn VideoReader> + Send + Sync>;

/// Server-side capture configuration.
#[derive(Clone)]
pub struct CameraConfig {
    /// `None` when capture is disabled by the operator.
    pub device: Option<PathBuf>,
    pub factory: CameraFactory,
}

impl CameraConfig {
    pub fn ffmpeg(device: Option<PathBuf>) -> Self {
        Self {
            device,
            factory: Arc::new(|| Box::new(FfmpegCameraReader::new()) as Box<dyn VideoReader>),
        }
    }

    /// Opens and immediately releases the configured device. Blocking.
    pub fn probe(&self) -> bool {
        let Some(device) = &self.device else {
            return false;
        };
        let mut reader = (self.factory)();
        let result = reader.open(device);
        reader.close();
        match result {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Camera probe on {} failed: {e}", device.display());
                false
            }
        }
    }
}

/// Shared application context, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Mutex<DetectMasksUseCase>>,
    pub settings: DetectionSettings,
    pub environment: Environment,
    pub camera: CameraConfig,
}

impl AppState {
    pub fn new(
        pipeline: DetectMasksUseCase,
        environment: Environment,
        camera: CameraConfig,
    ) -> Self {
        let settings = pipeline.settings().clone();
        Self {
            pipeline: Arc::new(Mutex::new(pipeline)),
            settings,
            environment,
            camera,
        }
    }

    /// True when `/video_feed` may try to open a local device.
    pub fn server_camera_enabled(&self) -> bool {
        !self.environment.hosted && self.camera.device.is_some()
    }

    pub fn pipeline_status(&self) -> PipelineStatus {
        lock_pipeline(&self.pipeline).status()
    }
}

/// Locks the shared pipeline, recovering from a lock poisoned by a
/// panicked request.
pub fn lock_pipeline(pipeline: &Mutex<DetectMasksUseCase>) -> MutexGuard<'_, DetectMasksUseCase> {
    pipeline.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering detection pipeline after a panicked request");
        poisoned.into_inner()
    })
}
