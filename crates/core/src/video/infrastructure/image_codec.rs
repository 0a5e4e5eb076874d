use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use thiserror::Error;

use crate::shared::constants::{IMAGE_EXTENSIONS, MAX_IMAGE_BYTES};
use crate::shared::frame::Frame;

#[derive(Debug, Error)]
pub enum ImageCodecError {
    #[error("image data is empty")]
    Empty,
    #[error("image data is too large: {0} bytes (max: {1} bytes)")]
    TooLarge(usize, usize),
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(String),
}

/// Decode encoded image bytes (PNG, JPEG, WebP, GIF, BMP, TIFF) into an RGB frame.
pub fn decode_image(bytes: &[u8]) -> Result<Frame, ImageCodecError> {
    if bytes.is_empty() {
        return Err(ImageCodecError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageCodecError::TooLarge(bytes.len(), MAX_IMAGE_BYTES));
    }

    let format = detect_format(bytes).ok_or(ImageCodecError::UnsupportedFormat)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(ImageCodecError::Decode)?;
    Ok(Frame::from_rgb_image(img.to_rgb8(), 0))
}

/// Encode a frame as baseline JPEG at `quality` (1-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, ImageCodecError> {
    let img = frame
        .to_rgb_image()
        .ok_or_else(|| ImageCodecError::Encode("frame is not RGB".to_string()))?;
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(&img)
        .map_err(|e| ImageCodecError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

/// Identify the container from magic bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some(ImageFormat::Png),
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::WebP),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(ImageFormat::Gif),
        [b'B', b'M', ..] => Some(ImageFormat::Bmp),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some(ImageFormat::Tiff),
        _ => None,
    }
}

/// True when the file name carries one of the accepted image extensions.
pub fn is_allowed_image_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
