use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{detect, page, status, stream};
use crate::state::AppState;

/// Upper bound for request bodies (uploads and posted frames).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/static/script.js", get(page::script))
        .route("/upload", post(detect::upload))
        .route("/detect", post(detect::upload))
        .route("/process_frame", post(detect::process_frame))
        .route("/video_feed", get(stream::video_feed))
        .route("/camera_status", get(status::camera_status))
        .route("/model_status", get(status::model_status))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
