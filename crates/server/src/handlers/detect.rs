//! Single-image endpoints: `/upload`, `/detect` and `/process_frame`.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use maskwatch_core::pipeline::detect_masks_use_case::Detection;
use maskwatch_core::shared::constants::IMAGE_EXTENSIONS;
use maskwatch_core::shared::frame::Frame;
use maskwatch_core::video::infrastructure::image_codec::{
    decode_image, encode_jpeg, is_allowed_image_filename,
};

use crate::error::{ApiError, ApiResult};
use crate::state::{lock_pipeline, AppState};

/// Successful detection: annotated JPEG as a data URL plus per-face results.
#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub image: String,
    pub detections: Vec<Detection>,
    pub faces: usize,
    pub demo_mode: bool,
    /// Degraded-mode notices, also drawn on the image when a font is available.
    pub banners: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    /// `data:image/...;base64,...` URL or bare base64.
    pub image: String,
}

/// POST /upload and POST /detect: multipart form with a `file` field.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<DetectResponse>> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;
        upload = Some((file_name, bytes.to_vec()));
        break;
    }

    let (file_name, bytes) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let file_name = file_name.unwrap_or_default();
    if file_name.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !is_allowed_image_filename(&file_name) {
        return Err(ApiError::bad_request(format!(
            "Invalid file type. Allowed types: {}",
            IMAGE_EXTENSIONS.join(", ")
        )));
    }

    let frame = decode(&bytes)?;
    log::info!(
        "Upload {file_name}: {}x{}, {} bytes",
        frame.width(),
        frame.height(),
        bytes.len()
    );
    let quality = state.settings.upload_jpeg_quality;
    run_detection(&state, frame, quality).await.map(Json)
}

/// POST /process_frame: one browser-captured frame, as JSON
/// `{"image": ...}` or multipart field `frame` (or `file`).
pub async fn process_frame(
    State(state): State<AppState>,
    request: Request,
) -> ApiResult<Json<DetectResponse>> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let bytes = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form data: {e}")))?;
        read_frame_field(multipart).await?
    } else {
        let Json(body) = Json::<FrameRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid frame request: {e}")))?;
        decode_base64_image(&body.image)?
    };

    let frame = decode(&bytes)?;
    let quality = state.settings.stream_jpeg_quality;
    run_detection(&state, frame, quality).await.map(Json)
}

async fn read_frame_field(mut multipart: Multipart) -> ApiResult<Vec<u8>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {e}")))?
    {
        if matches!(field.name(), Some("frame") | Some("file")) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read frame: {e}")))?;
            return Ok(bytes.to_vec());
        }
    }
    Err(ApiError::bad_request("No frame uploaded"))
}

/// Accepts a data URL (`data:image/jpeg;base64,....`) or bare base64.
fn decode_base64_image(data: &str) -> ApiResult<Vec<u8>> {
    let payload = match data.trim().strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, b64)| b64)
            .ok_or_else(|| ApiError::bad_request("Invalid image: malformed data URL"))?,
        None => data.trim(),
    };
    if payload.is_empty() {
        return Err(ApiError::bad_request("No frame uploaded"));
    }
    STANDARD
        .decode(payload)
        .map_err(|e| ApiError::bad_request(format!("Invalid image: bad base64 ({e})")))
}

fn decode(bytes: &[u8]) -> ApiResult<Frame> {
    decode_image(bytes).map_err(|e| ApiError::bad_request(format!("Invalid image: {e}")))
}

/// Runs the shared pipeline on the blocking pool and packages the result.
async fn run_detection(state: &AppState, frame: Frame, quality: u8) -> ApiResult<DetectResponse> {
    let pipeline = state.pipeline.clone();

    let (jpeg, report) = tokio::task::spawn_blocking(move || {
        let report = lock_pipeline(&pipeline)
            .execute(frame)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        let jpeg = encode_jpeg(&report.frame, quality)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok::<_, ApiError>((jpeg, report))
    })
    .await
    .map_err(|e| ApiError::internal(format!("Detection task failed: {e}")))??;

    Ok(DetectResponse {
        success: true,
        image: format!("data:image/jpeg;base64,{}", STANDARD.encode(&jpeg)),
        faces: report.detections.len(),
        detections: report.detections,
        demo_mode: report.demo_mode,
        banners: report.banners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::bare("aGVsbG8=")]
    #[case::data_url("data:image/png;base64,aGVsbG8=")]
    #[case::padded_whitespace("  data:image/jpeg;base64,aGVsbG8=\n")]
    fn test_decode_base64_image(#[case] input: &str) {
        assert_eq!(decode_base64_image(input).unwrap(), b"hello".to_vec());
    }

    #[rstest]
    #[case::empty("")]
    #[case::no_comma("data:image/png;base64")]
    #[case::not_base64("***")]
    fn test_decode_base64_image_rejects(#[case] input: &str) {
        assert!(matches!(
            decode_base64_image(input),
            Err(ApiError::BadRequest(_))
        ));
    }
}
