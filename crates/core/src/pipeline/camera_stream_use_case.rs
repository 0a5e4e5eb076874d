use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::pipeline::detect_masks_use_case::DetectMasksUseCase;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::infrastructure::image_codec::encode_jpeg;

/// Live camera loop: capture → detect masks → JPEG → sink.
///
/// The pipeline is shared with request handlers, so it is locked per
/// frame rather than for the whole stream. The sink returns `false` once
/// its consumer has gone away, which ends the loop.
pub struct CameraStreamUseCase {
    reader: Box<dyn VideoReader>,
    pipeline: Arc<Mutex<DetectMasksUseCase>>,
    jpeg_quality: u8,
}

impl CameraStreamUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        pipeline: Arc<Mutex<DetectMasksUseCase>>,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            reader,
            pipeline,
            jpeg_quality,
        }
    }

    /// Opens the capture device. Call before [`run`](Self::run) so open
    /// failures can be reported before any bytes are streamed.
    pub fn open(&mut self, device: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        self.reader.open(device)
    }

    /// Streams until the camera stops or the sink declines a frame.
    /// Returns the number of frames delivered. The device is released on
    /// every exit path.
    pub fn run<F>(&mut self, sink: F) -> Result<usize, Box<dyn std::error::Error>>
    where
        F: FnMut(Vec<u8>) -> bool,
    {
        let result = self.stream_frames(sink);
        self.reader.close();
        result
    }

    fn stream_frames<F>(&mut self, mut sink: F) -> Result<usize, Box<dyn std::error::Error>>
    where
        F: FnMut(Vec<u8>) -> bool,
    {
        let mut delivered = 0;

        for frame_result in self.reader.frames() {
            let frame = match frame_result {
                Ok(frame) => frame,
                Err(e) => {
                    log::warn!("Camera read failed, ending stream: {e}");
                    break;
                }
            };

            let report = {
                let mut pipeline = self
                    .pipeline
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                pipeline.execute(frame)
            };
            let report = match report {
                Ok(report) => report,
                Err(e) => {
                    log::warn!("Skipping camera frame: {e}");
                    continue;
                }
            };

            let jpeg = encode_jpeg(&report.frame, self.jpeg_quality)?;
            if !sink(jpeg) {
                log::info!("Stream consumer disconnected after {delivered} frame(s)");
                break;
            }
            delivered += 1;
        }

        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::frame_annotator::{AnnotatedFace, FrameAnnotator};
    use crate::classification::domain::mask_classifier::MaskClassifier;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::pipeline::detection_settings::DetectionSettings;
    use crate::shared::frame::Frame;
    use crate::shared::region::Region;
    use crate::video::infrastructure::image_codec::{detect_format, decode_image};
    use std::sync::atomic::{AtomicBool, Ordering};

    // --- Stubs ---

    struct StubCamera {
        frames: Vec<Result<Frame, String>>,
        closed: Arc<AtomicBool>,
    }

    impl StubCamera {
        fn new(count: usize) -> Self {
            Self {
                frames: (0..count)
                    .map(|i| Ok(Frame::new(vec![90; 64 * 48 * 3], 64, 48, 3, i)))
                    .collect(),
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl VideoReader for StubCamera {
        fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            if path == Path::new("missing") {
                return Err("no such device".into());
            }
            Ok(VideoMetadata {
                width: 64,
                height: 48,
                fps: 24.0,
                codec: "rawvideo".to_string(),
                source_path: Some(path.to_path_buf()),
            })
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(
                self.frames
                    .drain(..)
                    .map(|r| r.map_err(|e| -> Box<dyn std::error::Error> { e.into() })),
            )
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
            Ok(Vec::new())
        }
    }

    struct FixedClassifier;

    impl MaskClassifier for FixedClassifier {
        fn predict(&mut self, _face: &Frame) -> Result<f32, Box<dyn std::error::Error>> {
            Ok(0.1)
        }
    }

    struct NoopAnnotator;

    impl FrameAnnotator for NoopAnnotator {
        fn annotate(
            &self,
            _frame: &mut Frame,
            _faces: &[AnnotatedFace],
            _banners: &[String],
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    fn pipeline() -> Arc<Mutex<DetectMasksUseCase>> {
        Arc::new(Mutex::new(DetectMasksUseCase::new(
            Some(Box::new(NoFaces)),
            Some(Box::new(FixedClassifier)),
            Box::new(NoopAnnotator),
            DetectionSettings::default(),
        )))
    }

    // --- Tests ---

    #[test]
    fn test_streams_every_frame_as_jpeg() {
        let camera = StubCamera::new(3);
        let closed = camera.closed.clone();
        let mut uc = CameraStreamUseCase::new(Box::new(camera), pipeline(), 75);
        uc.open(Path::new("/dev/video0")).unwrap();

        let mut chunks = Vec::new();
        let delivered = uc
            .run(|jpeg| {
                chunks.push(jpeg);
                true
            })
            .unwrap();

        assert_eq!(delivered, 3);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert_eq!(detect_format(chunk), Some(image::ImageFormat::Jpeg));
            assert_eq!(decode_image(chunk).unwrap().width(), 64);
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_sink_refusal_stops_stream_and_releases_camera() {
        let camera = StubCamera::new(10);
        let closed = camera.closed.clone();
        let mut uc = CameraStreamUseCase::new(Box::new(camera), pipeline(), 75);
        uc.open(Path::new("/dev/video0")).unwrap();

        let mut calls = 0;
        let delivered = uc
            .run(|_| {
                calls += 1;
                calls < 2
            })
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(calls, 2);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_read_error_ends_stream() {
        let mut camera = StubCamera::new(1);
        camera.frames.push(Err("device unplugged".to_string()));
        camera
            .frames
            .push(Ok(Frame::new(vec![0; 64 * 48 * 3], 64, 48, 3, 2)));
        let mut uc = CameraStreamUseCase::new(Box::new(camera), pipeline(), 75);

        let delivered = uc.run(|_| true).unwrap();
        assert_eq!(delivered, 1);
    }

    #[test]
    fn test_open_failure_is_reported() {
        let mut uc = CameraStreamUseCase::new(Box::new(StubCamera::new(0)), pipeline(), 75);
        assert!(uc.open(Path::new("missing")).is_err());
    }
}
