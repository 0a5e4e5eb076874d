use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::annotation::domain::frame_annotator::{AnnotatedFace, FrameAnnotator};
use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::classification::domain::mask_verdict::{MaskLabel, MaskVerdict};
use crate::classification::infrastructure::demo_mask_classifier::DemoMaskClassifier;
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::detection_settings::{DetectionSettings, Fallback};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

pub const DETECTOR_MISSING_BANNER: &str = "Face detector not loaded";
pub const MODEL_MISSING_BANNER: &str = "Model not loaded";
pub const DEMO_MODE_BANNER: &str = "Demo mode: random predictions";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("annotation failed: {0}")]
    Annotation(String),
}

/// One classified face as reported to clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub label: MaskLabel,
    pub confidence: f32,
    /// `[x, y, width, height]` in pixels of the input image.
    pub bbox: [i32; 4],
}

/// Result of running the pipeline over one frame.
#[derive(Clone, Debug)]
pub struct DetectionReport {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub demo_mode: bool,
    pub banners: Vec<String>,
}

/// What the pipeline has loaded, for `/model_status`-style reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineStatus {
    pub detector_loaded: bool,
    pub model_loaded: bool,
    pub demo_mode: bool,
    pub model_input_shape: Option<Vec<i64>>,
}

/// Detect faces, classify each for a mask and draw the verdicts.
///
/// Either model may be absent. A missing detector or (with
/// [`Fallback::Banner`]) a missing classifier yields the unmodified frame
/// with a banner instead of an error, so the service keeps answering.
pub struct DetectMasksUseCase {
    detector: Option<Box<dyn FaceDetector>>,
    classifier: Option<Box<dyn MaskClassifier>>,
    annotator: Box<dyn FrameAnnotator>,
    settings: DetectionSettings,
}

impl DetectMasksUseCase {
    pub fn new(
        detector: Option<Box<dyn FaceDetector>>,
        classifier: Option<Box<dyn MaskClassifier>>,
        annotator: Box<dyn FrameAnnotator>,
        settings: DetectionSettings,
    ) -> Self {
        let classifier = match (classifier, settings.fallback) {
            (Some(c), _) => Some(c),
            (None, Fallback::Demo) => {
                log::warn!("Mask model unavailable; using demo classifier");
                Some(Box::new(DemoMaskClassifier::new()) as Box<dyn MaskClassifier>)
            }
            (None, Fallback::Banner) => {
                log::warn!("Mask model unavailable; detections will be skipped");
                None
            }
        };

        Self {
            detector,
            classifier,
            annotator,
            settings,
        }
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn status(&self) -> PipelineStatus {
        let demo_mode = self.is_demo();
        PipelineStatus {
            detector_loaded: self.detector.is_some(),
            model_loaded: self.classifier.is_some() && !demo_mode,
            demo_mode,
            model_input_shape: self.classifier.as_ref().and_then(|c| c.input_shape()),
        }
    }

    fn is_demo(&self) -> bool {
        self.classifier.as_ref().is_some_and(|c| c.is_demo())
    }

    pub fn execute(&mut self, mut frame: Frame) -> Result<DetectionReport, PipelineError> {
        let started = Instant::now();
        let demo_mode = self.is_demo();

        let (detector, classifier) = match (self.detector.as_mut(), self.classifier.as_mut()) {
            (Some(detector), Some(classifier)) => (detector, classifier),
            (None, _) => {
                return banner_only(self.annotator.as_ref(), frame, DETECTOR_MISSING_BANNER, demo_mode)
            }
            (_, None) => {
                return banner_only(self.annotator.as_ref(), frame, MODEL_MISSING_BANNER, demo_mode)
            }
        };

        let regions = detector
            .detect(&frame)
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        let faces = select_faces(&regions, &frame, self.settings.min_face_size);

        let mut annotated = Vec::with_capacity(faces.len());
        for region in faces {
            let verdict = classify_face(classifier.as_mut(), &frame, &region, self.settings.threshold);
            annotated.push(AnnotatedFace { region, verdict });
        }

        let banners = if demo_mode {
            vec![DEMO_MODE_BANNER.to_string()]
        } else {
            Vec::new()
        };
        self.annotator
            .annotate(&mut frame, &annotated, &banners)
            .map_err(|e| PipelineError::Annotation(e.to_string()))?;

        let detections: Vec<Detection> = annotated
            .iter()
            .map(|face| Detection {
                label: face.verdict.label,
                confidence: face.verdict.confidence,
                bbox: face.region.to_bbox(),
            })
            .collect();

        log::info!(
            "Frame {}: {} face(s) detected, {} classified in {} ms",
            frame.index(),
            regions.len(),
            detections.len(),
            started.elapsed().as_millis()
        );

        Ok(DetectionReport {
            frame,
            detections,
            demo_mode,
            banners,
        })
    }
}

/// Reports the frame untouched apart from a single status banner.
fn banner_only(
    annotator: &dyn FrameAnnotator,
    mut frame: Frame,
    banner: &str,
    demo_mode: bool,
) -> Result<DetectionReport, PipelineError> {
    log::debug!("Skipping detection: {banner}");
    let banners = vec![banner.to_string()];
    annotator
        .annotate(&mut frame, &[], &banners)
        .map_err(|e| PipelineError::Annotation(e.to_string()))?;
    Ok(DetectionReport {
        frame,
        detections: Vec::new(),
        demo_mode,
        banners,
    })
}

/// Clamps detector output to the frame and drops faces below `min_size`
/// in either dimension.
fn select_faces(regions: &[Region], frame: &Frame, min_size: u32) -> Vec<Region> {
    regions
        .iter()
        .filter_map(|r| r.clamp_to(frame.width(), frame.height()))
        .filter(|r| r.is_at_least(min_size, min_size))
        .collect()
}

/// Classifies one face. Any failure becomes an `Error` verdict for this
/// face only.
fn classify_face(
    classifier: &mut dyn MaskClassifier,
    frame: &Frame,
    region: &Region,
    threshold: f32,
) -> MaskVerdict {
    let Some(crop) = frame.crop(region) else {
        return MaskVerdict::error();
    };
    match classifier.predict(&crop) {
        Ok(probability) => MaskVerdict::from_probability(probability, threshold),
        Err(e) => {
            log::warn!("Classification failed for face at {:?}: {e}", region.to_bbox());
            MaskVerdict::error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubDetector {
        regions: Vec<Region>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
            Ok(self.regions.clone())
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
            Err("session crashed".into())
        }
    }

    /// Returns queued probabilities in order; `None` entries fail.
    struct ScriptedClassifier {
        outputs: Vec<Option<f32>>,
        seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
    }

    impl ScriptedClassifier {
        fn new(outputs: Vec<Option<f32>>) -> Self {
            Self {
                outputs,
                seen_sizes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl MaskClassifier for ScriptedClassifier {
        fn predict(&mut self, face: &Frame) -> Result<f32, Box<dyn std::error::Error>> {
            self.seen_sizes
                .lock()
                .unwrap()
                .push((face.width(), face.height()));
            match self.outputs.remove(0) {
                Some(p) => Ok(p),
                None => Err("bad tensor".into()),
            }
        }

        fn input_shape(&self) -> Option<Vec<i64>> {
            Some(vec![-1, 224, 224, 3])
        }
    }

    type AnnotateCall = (Vec<AnnotatedFace>, Vec<String>);

    struct RecordingAnnotator {
        calls: Arc<Mutex<Vec<AnnotateCall>>>,
    }

    impl RecordingAnnotator {
        fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FrameAnnotator for RecordingAnnotator {
        fn annotate(
            &self,
            _frame: &mut Frame,
            faces: &[AnnotatedFace],
            banners: &[String],
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.calls
                .lock()
                .unwrap()
                .push((faces.to_vec(), banners.to_vec()));
            Ok(())
        }
    }

    // --- Helpers ---

    fn make_frame(w: u32, h: u32) -> Frame {
        Frame::new(vec![128; (w * h * 3) as usize], w, h, 3, 0)
    }

    fn banner_settings() -> DetectionSettings {
        DetectionSettings {
            fallback: Fallback::Banner,
            ..DetectionSettings::default()
        }
    }

    fn use_case(
        regions: Vec<Region>,
        outputs: Vec<Option<f32>>,
    ) -> (DetectMasksUseCase, Arc<Mutex<Vec<AnnotateCall>>>) {
        let annotator = RecordingAnnotator::new();
        let calls = annotator.calls.clone();
        let uc = DetectMasksUseCase::new(
            Some(Box::new(StubDetector { regions })),
            Some(Box::new(ScriptedClassifier::new(outputs))),
            Box::new(annotator),
            DetectionSettings::default(),
        );
        (uc, calls)
    }

    // --- Tests ---

    #[test]
    fn test_no_faces_yields_empty_detections() {
        let (mut uc, calls) = use_case(vec![], vec![]);
        let frame = make_frame(320, 240);
        let original = frame.data().to_vec();

        let report = uc.execute(frame).unwrap();

        assert!(report.detections.is_empty());
        assert!(report.banners.is_empty());
        assert_eq!(report.frame.data(), &original[..]);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_labels_follow_threshold() {
        let (mut uc, _) = use_case(
            vec![Region::new(0, 0, 80, 80), Region::new(100, 0, 80, 80)],
            vec![Some(0.2), Some(0.9)],
        );
        let report = uc.execute(make_frame(320, 240)).unwrap();

        assert_eq!(report.detections.len(), 2);
        assert_eq!(report.detections[0].label, MaskLabel::Mask);
        assert_relative_eq!(report.detections[0].confidence, 0.8, epsilon = 1e-6);
        assert_eq!(report.detections[1].label, MaskLabel::NoMask);
        assert_relative_eq!(report.detections[1].confidence, 0.9, epsilon = 1e-6);
        assert_eq!(report.detections[1].bbox, [100, 0, 80, 80]);
    }

    #[test]
    fn test_probability_at_threshold_is_no_mask() {
        let (mut uc, _) = use_case(vec![Region::new(0, 0, 80, 80)], vec![Some(0.5)]);
        let report = uc.execute(make_frame(200, 200)).unwrap();
        assert_eq!(report.detections[0].label, MaskLabel::NoMask);
    }

    #[test]
    fn test_small_faces_skipped() {
        let (mut uc, calls) = use_case(
            vec![
                Region::new(0, 0, 59, 100),
                Region::new(100, 0, 100, 59),
                Region::new(0, 100, 60, 60),
            ],
            vec![Some(0.1)],
        );
        let report = uc.execute(make_frame(300, 300)).unwrap();

        assert_eq!(report.detections.len(), 1);
        assert_eq!(report.detections[0].bbox, [0, 100, 60, 60]);
        assert_eq!(calls.lock().unwrap()[0].0.len(), 1);
    }

    #[test]
    fn test_regions_clamped_before_size_filter() {
        // 100 wide on paper, but only 30 px remain inside the frame
        let (mut uc, _) = use_case(vec![Region::new(170, 0, 100, 100)], vec![]);
        let report = uc.execute(make_frame(200, 200)).unwrap();
        assert!(report.detections.is_empty());
    }

    #[test]
    fn test_classifier_receives_cropped_face() {
        let classifier = ScriptedClassifier::new(vec![Some(0.3)]);
        let sizes = classifier.seen_sizes.clone();
        let mut uc = DetectMasksUseCase::new(
            Some(Box::new(StubDetector {
                regions: vec![Region::new(-10, 20, 90, 70)],
            })),
            Some(Box::new(classifier)),
            Box::new(RecordingAnnotator::new()),
            DetectionSettings::default(),
        );
        let report = uc.execute(make_frame(200, 200)).unwrap();

        assert_eq!(sizes.lock().unwrap().as_slice(), &[(80, 70)]);
        assert_eq!(report.detections[0].bbox, [0, 20, 80, 70]);
    }

    #[test]
    fn test_classifier_failure_is_isolated_per_face() {
        let (mut uc, calls) = use_case(
            vec![
                Region::new(0, 0, 80, 80),
                Region::new(100, 0, 80, 80),
                Region::new(200, 0, 80, 80),
            ],
            vec![Some(0.1), None, Some(0.7)],
        );
        let report = uc.execute(make_frame(300, 100)).unwrap();

        let labels: Vec<MaskLabel> = report.detections.iter().map(|d| d.label).collect();
        assert_eq!(
            labels,
            vec![MaskLabel::Mask, MaskLabel::Error, MaskLabel::NoMask]
        );
        assert_relative_eq!(report.detections[1].confidence, 0.0);
        // the failed face is still drawn
        assert_eq!(calls.lock().unwrap()[0].0.len(), 3);
    }

    #[test]
    fn test_detector_failure_is_pipeline_error() {
        let mut uc = DetectMasksUseCase::new(
            Some(Box::new(FailingDetector)),
            Some(Box::new(ScriptedClassifier::new(vec![]))),
            Box::new(RecordingAnnotator::new()),
            DetectionSettings::default(),
        );
        let result = uc.execute(make_frame(64, 64));
        assert!(matches!(result, Err(PipelineError::Detection(msg)) if msg.contains("session crashed")));
    }

    #[test]
    fn test_missing_detector_draws_banner() {
        let annotator = RecordingAnnotator::new();
        let calls = annotator.calls.clone();
        let mut uc = DetectMasksUseCase::new(
            None,
            Some(Box::new(ScriptedClassifier::new(vec![]))),
            Box::new(annotator),
            DetectionSettings::default(),
        );
        let report = uc.execute(make_frame(64, 64)).unwrap();

        assert!(report.detections.is_empty());
        assert_eq!(report.banners, vec![DETECTOR_MISSING_BANNER.to_string()]);
        assert_eq!(calls.lock().unwrap()[0].1, report.banners);
        assert!(!uc.status().detector_loaded);
    }

    #[test]
    fn test_missing_model_with_banner_fallback() {
        let mut uc = DetectMasksUseCase::new(
            Some(Box::new(StubDetector {
                regions: vec![Region::new(0, 0, 80, 80)],
            })),
            None,
            Box::new(RecordingAnnotator::new()),
            banner_settings(),
        );
        let report = uc.execute(make_frame(100, 100)).unwrap();

        assert!(report.detections.is_empty());
        assert!(!report.demo_mode);
        assert_eq!(report.banners, vec![MODEL_MISSING_BANNER.to_string()]);

        let status = uc.status();
        assert!(!status.model_loaded);
        assert!(!status.demo_mode);
        assert_eq!(status.model_input_shape, None);
    }

    #[test]
    fn test_missing_model_with_demo_fallback_still_labels() {
        let mut uc = DetectMasksUseCase::new(
            Some(Box::new(StubDetector {
                regions: vec![Region::new(0, 0, 80, 80), Region::new(100, 0, 80, 80)],
            })),
            None,
            Box::new(RecordingAnnotator::new()),
            DetectionSettings::default(),
        );
        let report = uc.execute(make_frame(200, 100)).unwrap();

        assert!(report.demo_mode);
        assert_eq!(report.banners, vec![DEMO_MODE_BANNER.to_string()]);
        assert_eq!(report.detections.len(), 2);
        for d in &report.detections {
            assert_ne!(d.label, MaskLabel::Error);
            assert!((0.0..=1.0).contains(&d.confidence));
        }

        let status = uc.status();
        assert!(status.demo_mode);
        assert!(!status.model_loaded);
    }

    #[test]
    fn test_status_with_real_model() {
        let (uc, _) = use_case(vec![], vec![]);
        assert_eq!(
            uc.status(),
            PipelineStatus {
                detector_loaded: true,
                model_loaded: true,
                demo_mode: false,
                model_input_shape: Some(vec![-1, 224, 224, 3]),
            }
        );
    }

    #[test]
    fn test_detection_serializes_with_display_label() {
        let d = Detection {
            label: MaskLabel::NoMask,
            confidence: 0.75,
            bbox: [1, 2, 3, 4],
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["label"], "No Mask");
        assert_eq!(json["bbox"], serde_json::json!([1, 2, 3, 4]));
        assert_relative_eq!(json["confidence"].as_f64().unwrap(), 0.75);
    }
}
