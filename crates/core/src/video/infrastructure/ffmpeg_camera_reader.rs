use std::path::Path;

use crate::shared::constants::{CAMERA_FPS, CAMERA_HEIGHT, CAMERA_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// ffmpeg input device used for local capture on this platform.
#[cfg(target_os = "linux")]
const CAPTURE_FORMAT: &str = "video4linux2";
#[cfg(target_os = "macos")]
const CAPTURE_FORMAT: &str = "avfoundation";
#[cfg(target_os = "windows")]
const CAPTURE_FORMAT: &str = "dshow";
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const CAPTURE_FORMAT: &str = "video4linux2";

/// Device string for the camera at `index` in the platform's naming scheme.
pub fn default_camera_device(index: u32) -> String {
    #[cfg(target_os = "linux")]
    {
        format!("/dev/video{index}")
    }
    #[cfg(target_os = "macos")]
    {
        format!("{index}:none")
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        // dshow addresses devices by name; callers pass one explicitly.
        format!("video={index}")
    }
}

/// Captures frames from a local camera via ffmpeg-next (libavdevice).
///
/// Requests 640×480 at 24 fps; the driver may pick the nearest supported
/// mode. Each decoded frame is converted to RGB24.
pub struct FfmpegCameraReader {
    width: u32,
    height: u32,
    fps: u32,
    state: Option<CaptureState>,
}

struct CaptureState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
}

// Safety: FfmpegCameraReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraReader {}

impl FfmpegCameraReader {
    pub fn new() -> Self {
        Self::with_mode(CAMERA_WIDTH, CAMERA_HEIGHT, CAMERA_FPS)
    }

    pub fn with_mode(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            state: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }
}

impl Default for FfmpegCameraReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegCameraReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == CAPTURE_FORMAT)
            .ok_or_else(|| format!("ffmpeg capture format {CAPTURE_FORMAT} is unavailable"))?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", self.width, self.height));
        options.set("framerate", &self.fps.to_string());

        let ctx = ffmpeg_next::format::open_with(
            path,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )?;
        let ffmpeg_next::format::context::Context::Input(ictx) = ctx else {
            return Err("capture device did not open as an input".into());
        };

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream on capture device")?;

        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            self.fps as f64
        };

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg_next::format::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        log::info!(
            "Camera {} opened: {}x{} @ {:.1} fps",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps
        );

        self.state = Some(CaptureState {
            ictx,
            decoder,
            scaler,
            stream_index,
        });

        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(state) = self.state.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegCameraReader: not opened".into())));
        };
        Box::new(CaptureIter {
            state,
            frame_index: 0,
            done: false,
        })
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("Camera released");
        }
    }
}

/// Lazy iterator pulling one decoded frame per call until the device stops.
struct CaptureIter<'a> {
    state: &'a mut CaptureState,
    frame_index: usize,
    done: bool,
}

impl CaptureIter<'_> {
    fn try_receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.state.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.state.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(Box::new(e)));
        }
        let (width, height) = (rgb_frame.width(), rgb_frame.height());
        let pixels = extract_rgb_pixels(rgb_frame.data(0), rgb_frame.stride(0), width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for CaptureIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Some(result) = self.try_receive() {
                return Some(result);
            }

            let Some((stream, packet)) = self.state.ictx.packets().next() else {
                self.done = true;
                return None;
            };
            if stream.index() != self.state.stream_index {
                continue;
            }
            if let Err(e) = self.state.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable camera packet: {e}");
            }
        }
    }
}

/// Copies rows out of a padded plane into a tightly packed RGB buffer.
///
/// ffmpeg frames may carry padding at the end of each row (stride > width*3).
fn extract_rgb_pixels(data: &[u8], stride: usize, width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_rgb_pixels_strips_padding() {
        // 2x2 RGB with 2 padding bytes per row (stride 8)
        let data = [
            1, 2, 3, 4, 5, 6, 0xAA, 0xAA, //
            7, 8, 9, 10, 11, 12, 0xBB, 0xBB,
        ];
        let pixels = extract_rgb_pixels(&data, 8, 2, 2);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_extract_rgb_pixels_without_padding() {
        let data: Vec<u8> = (0..12).collect();
        assert_eq!(extract_rgb_pixels(&data, 6, 2, 2), data);
    }

    #[test]
    fn test_frames_without_open_returns_error() {
        let mut reader = FfmpegCameraReader::new();
        let result = reader.frames().next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_open_missing_device_is_error() {
        let mut reader = FfmpegCameraReader::new();
        assert!(reader.open(Path::new("/dev/nonexistent-camera-42")).is_err());
        assert!(!reader.is_open());
    }

    #[test]
    fn test_close_idempotent() {
        let mut reader = FfmpegCameraReader::new();
        reader.close();
        reader.close();
        assert!(!reader.is_open());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_default_camera_device_linux() {
        assert_eq!(default_camera_device(0), "/dev/video0");
        assert_eq!(default_camera_device(2), "/dev/video2");
    }
}
