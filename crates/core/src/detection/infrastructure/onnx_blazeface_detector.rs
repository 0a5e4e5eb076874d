//! BlazeFace face detector using ONNX Runtime via `ort`.
//!
//! A lightweight face detector that provides bounding boxes only. It is the
//! rectangle producer in front of the mask classifier.
use std::path::Path;

use image::imageops::FilterType;
use ndarray::Array4;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::execution_provider::load_session;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Default confidence threshold.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output (box + 6 keypoints).
const REGRESSOR_STRIDE: usize = 16;

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    confidence: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;
        log::info!("Face detector loaded from {}", model_path.display());
        Ok(Self {
            session,
            confidence,
            anchors: generate_anchors(),
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(Vec::new());
        }

        let input_tensor = preprocess(frame, INPUT_SIZE)?;

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(
                format!("BlazeFace model expected 2 outputs, got {}", outputs.len()).into(),
            );
        }

        let regressors = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let reg_data = regressors.as_slice().ok_or("Cannot get regressor slice")?;
        let score_data = scores.as_slice().ok_or("Cannot get score slice")?;

        Ok(decode_regions(
            reg_data,
            score_data,
            &self.anchors,
            frame.width(),
            frame.height(),
            self.confidence,
        ))
    }
}

/// A decoded box in frame pixels, before suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    /// `[x1, y1, x2, y2]`
    bbox: [f32; 4],
    score: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]) * (self.bbox[3] - self.bbox[1])
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix = (self.bbox[2].min(other.bbox[2]) - self.bbox[0].max(other.bbox[0])).max(0.0);
        let iy = (self.bbox[3].min(other.bbox[3]) - self.bbox[1].max(other.bbox[1])).max(0.0);
        let inter = ix * iy;
        if inter <= 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    fn to_region(self, fw: u32, fh: u32) -> Option<Region> {
        let [x1, y1, x2, y2] = self.bbox;
        Region::new(x1 as i32, y1 as i32, (x2 - x1) as i32, (y2 - y1) as i32).clamp_to(fw, fh)
    }
}

/// Turn raw model outputs into suppressed regions clamped to the frame.
fn decode_regions(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    fw: u32,
    fh: u32,
    confidence: f64,
) -> Vec<Region> {
    let (fw_f, fh_f) = (fw as f32, fh as f32);
    let scale = INPUT_SIZE as f32;

    let candidates: Vec<Candidate> = score_data
        .iter()
        .zip(anchors)
        .take(NUM_ANCHORS)
        .enumerate()
        .filter_map(|(i, (&raw_score, anchor))| {
            let score = sigmoid(raw_score);
            if (score as f64) < confidence {
                return None;
            }
            let box_ = reg_data.get(i * REGRESSOR_STRIDE..i * REGRESSOR_STRIDE + 4)?;
            let cx = anchor[0] + box_[0] / scale;
            let cy = anchor[1] + box_[1] / scale;
            let (half_w, half_h) = (box_[2] / scale / 2.0, box_[3] / scale / 2.0);

            let bbox = [
                ((cx - half_w) * fw_f).max(0.0),
                ((cy - half_h) * fh_f).max(0.0),
                ((cx + half_w) * fw_f).min(fw_f),
                ((cy + half_h) * fh_f).min(fh_f),
            ];
            (bbox[2] > bbox[0] && bbox[3] > bbox[1]).then_some(Candidate { bbox, score })
        })
        .collect();

    suppress_overlaps(candidates, NMS_IOU_THRESH)
        .into_iter()
        .filter_map(|c| c.to_region(fw, fh))
        .collect()
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize the frame to `size × size` (bilinear) and lay it out as NCHW
/// float32 in `[0, 1]`.
fn preprocess(frame: &Frame, size: u32) -> Result<Array4<f32>, Box<dyn std::error::Error>> {
    let rgb = frame
        .to_rgb_image()
        .ok_or("BlazeFace expects an RGB frame")?;
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

    let s = size as usize;
    Ok(Array4::from_shape_fn((1, 3, s, s), |(_, c, y, x)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    }))
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Anchor centres for the short-range model: a 16×16 grid with 2 anchors
/// per cell followed by an 8×8 grid with 6.
fn generate_anchors() -> Vec<[f32; 2]> {
    const LAYERS: [(usize, usize); 2] = [(16, 2), (8, 6)]; // (grid, anchors per cell)

    LAYERS
        .iter()
        .flat_map(|&(grid, per_cell)| {
            (0..grid * grid).flat_map(move |cell| {
                let cx = ((cell % grid) as f32 + 0.5) / grid as f32;
                let cy = ((cell / grid) as f32 + 0.5) / grid as f32;
                std::iter::repeat([cx, cy]).take(per_cell)
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Suppression
// ---------------------------------------------------------------------------

/// Greedy non-maximum suppression: keep the best-scoring box, drop the
/// rest that overlap it by more than `iou_thresh`, repeat.
fn suppress_overlaps(mut candidates: Vec<Candidate>, iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) <= iou_thresh) {
            kept.push(candidate);
        }
    }
    kept
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
