//! GET /video_feed: annotated MJPEG from a server-side camera.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use maskwatch_core::pipeline::camera_stream_use_case::CameraStreamUseCase;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const MJPEG_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Frames buffered between the capture thread and the HTTP body.
const STREAM_BUFFER: usize = 2;

pub async fn video_feed(State(state): State<AppState>) -> ApiResult<Response> {
    if state.environment.hosted {
        return Err(ApiError::unavailable(
            "Server camera is not available in hosted deployments; use browser capture",
        ));
    }
    let Some(device) = state.camera.device.clone() else {
        return Err(ApiError::unavailable("Server camera is disabled"));
    };

    let reader = (state.camera.factory)();
    let pipeline = state.pipeline.clone();
    let quality = state.settings.stream_jpeg_quality;

    let mut use_case = tokio::task::spawn_blocking(move || {
        let mut use_case = CameraStreamUseCase::new(reader, pipeline, quality);
        use_case
            .open(&device)
            .map_err(|e| ApiError::unavailable(format!("Camera not available: {e}")))?;
        Ok::<_, ApiError>(use_case)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Camera task failed: {e}")))??;

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(STREAM_BUFFER);
    tokio::task::spawn_blocking(move || {
        let result = use_case.run(|jpeg| tx.blocking_send(Ok(multipart_chunk(&jpeg))).is_ok());
        match result {
            Ok(frames) => log::info!("Camera stream ended after {frames} frame(s)"),
            Err(e) => log::warn!("Camera stream failed: {e}"),
        }
    });

    Response::builder()
        .header(CONTENT_TYPE, MJPEG_CONTENT_TYPE)
        .header(CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// One part of the `multipart/x-mixed-replace` body.
fn multipart_chunk(jpeg: &[u8]) -> Bytes {
    let mut chunk = Vec::with_capacity(jpeg.len() + 64);
    chunk.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    chunk.extend_from_slice(jpeg);
    chunk.extend_from_slice(b"\r\n");
    Bytes::from(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multipart_chunk_framing() {
        let chunk = multipart_chunk(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let mut expected = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(&chunk[..], expected.as_slice());
    }
}
