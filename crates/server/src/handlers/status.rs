use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CameraStatusResponse {
    pub camera_available: bool,
    pub hosted: bool,
    pub platform: String,
    /// `"server"` streams from `/video_feed`; `"client"` means the browser
    /// captures frames and posts them to `/process_frame`.
    pub mode: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelStatusResponse {
    pub model_loaded: bool,
    pub detector_loaded: bool,
    pub demo_mode: bool,
    pub input_shape: Option<Vec<i64>>,
}

/// GET /camera_status. Probes the device so a machine without a webcam
/// reports client mode.
pub async fn camera_status(State(state): State<AppState>) -> Json<CameraStatusResponse> {
    let available = if state.server_camera_enabled() {
        let camera = state.camera.clone();
        tokio::task::spawn_blocking(move || camera.probe())
            .await
            .unwrap_or(false)
    } else {
        false
    };
    Json(CameraStatusResponse {
        camera_available: available,
        hosted: state.environment.hosted,
        platform: state.environment.platform.clone(),
        mode: if available { "server" } else { "client" },
    })
}

/// GET /model_status
pub async fn model_status(State(state): State<AppState>) -> Json<ModelStatusResponse> {
    let status = state.pipeline_status();
    Json(ModelStatusResponse {
        model_loaded: status.model_loaded,
        detector_loaded: status.detector_loaded,
        demo_mode: status.demo_mode,
        input_shape: status.model_input_shape,
    })
}
