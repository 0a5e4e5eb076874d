mod config;
mod environment;
mod error;
mod handlers;
mod routes;
mod state;

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use maskwatch_core::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
use maskwatch_core::classification::domain::mask_classifier::MaskClassifier;
use maskwatch_core::detection::domain::face_detector::FaceDetector;
use maskwatch_core::detection::infrastructure::model_resolver::ModelSource;
use maskwatch_core::pipeline::detect_masks_use_case::DetectMasksUseCase;
use maskwatch_core::pipeline::detection_settings::DetectionSettings;
use maskwatch_core::pipeline::model_loading::{
    default_search_dirs, load_face_detector, load_mask_classifier,
};
use maskwatch_core::video::infrastructure::ffmpeg_camera_reader::default_camera_device;

use crate::config::ServerArgs;
use crate::environment::Environment;
use crate::state::{AppState, CameraConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();
    let settings = args.detection_settings()?;
    let environment = Environment::detect();

    let pipeline = build_pipeline(&args, settings);
    let status = pipeline.status();
    log::info!(
        "Detector loaded: {}, mask model loaded: {}, demo mode: {}",
        status.detector_loaded,
        status.model_loaded,
        status.demo_mode
    );

    let camera = camera_config(&args, &environment);
    let state = AppState::new(pipeline, environment, camera);
    let app = routes::router(state);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(args.bind).await?;
        log::info!("Listening on http://{}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    log::info!("Server stopped");
    Ok(())
}

/// Loads both models, logging and continuing without whichever fails.
fn build_pipeline(args: &ServerArgs, settings: DetectionSettings) -> DetectMasksUseCase {
    let detector_source = model_source(&args.detector, args.detector_url.clone());
    let detector: Option<Box<dyn FaceDetector>> =
        match load_face_detector(&detector_source, settings.detector_confidence, None) {
            Ok(d) => Some(d),
            Err(e) => {
                log::warn!("Face detector unavailable: {e}");
                None
            }
        };

    let model_source = model_source(&args.model, args.model_url.clone());
    let classifier: Option<Box<dyn MaskClassifier>> = match load_mask_classifier(&model_source, None)
    {
        Ok(c) => Some(c),
        Err(e) => {
            log::warn!("Mask model unavailable: {e}");
            None
        }
    };

    let annotator = OverlayAnnotator::with_font_search(args.font.as_deref());
    DetectMasksUseCase::new(detector, classifier, Box::new(annotator), settings)
}

/// `path` is either a bare file name (looked up in the search dirs and
/// cache) or a path the operator points at directly.
fn model_source(path: &Path, url: Option<String>) -> ModelSource {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    ModelSource {
        name,
        path: Some(path.to_path_buf()),
        search_dirs: default_search_dirs(),
        url,
    }
}

fn camera_config(args: &ServerArgs, environment: &Environment) -> CameraConfig {
    if args.disable_camera || environment.hosted {
        log::info!("Server-side camera disabled; clients must post frames to /process_frame");
        return CameraConfig::ffmpeg(None);
    }
    let device = args
        .camera_device
        .clone()
        .unwrap_or_else(|| default_camera_device(0));
    CameraConfig::ffmpeg(Some(PathBuf::from(device)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}
