use std::path::Path;

use image::imageops::FilterType;

use crate::classification::domain::mask_classifier::MaskClassifier;
use crate::detection::infrastructure::execution_provider::load_session;
use crate::shared::constants::CLASSIFIER_INPUT_SIZE;
use crate::shared::frame::Frame;

/// Binary mask classifier backed by an ONNX Runtime session.
///
/// Expects an NHWC `[1, S, S, 3]` float input scaled to `[0, 1]` and a
/// single sigmoid output, as produced by exporting the Keras model.
pub struct OnnxMaskClassifier {
    session: ort::session::Session,
    input_size: u32,
    input_shape: Vec<i64>,
}

impl OnnxMaskClassifier {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = load_session(model_path)?;

        let input_shape = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    Some(shape.iter().copied().collect::<Vec<i64>>())
                } else {
                    None
                }
            })
            .unwrap_or_default();
        let input_size = input_size_from_shape(&input_shape);

        log::info!("Mask model loaded from {}", model_path.display());
        log::info!("Mask model input shape: {input_shape:?}");

        Ok(Self {
            session,
            input_size,
            input_shape,
        })
    }
}

impl MaskClassifier for OnnxMaskClassifier {
    fn predict(&mut self, face: &Frame) -> Result<f32, Box<dyn std::error::Error>> {
        let tensor = preprocess(face, self.input_size)?;
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;

        let prediction = outputs[0].try_extract_array::<f32>()?;
        let prob = prediction
            .iter()
            .next()
            .copied()
            .ok_or("Mask model returned an empty output")?;
        log::debug!("Raw prediction: {prob}");
        Ok(prob)
    }

    fn input_shape(&self) -> Option<Vec<i64>> {
        Some(self.input_shape.clone())
    }
}

/// NHWC models carry the spatial size at index 1; anything else falls back
/// to the default classifier resolution.
fn input_size_from_shape(shape: &[i64]) -> u32 {
    match shape {
        [_, h, w, 3] if *h > 0 && h == w => *h as u32,
        _ => CLASSIFIER_INPUT_SIZE,
    }
}

/// Resize the crop to `size × size` (bilinear) and scale to `[0,1]` NHWC float32.
fn preprocess(face: &Frame, size: u32) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let img = face.to_rgb_image().ok_or("Face crop is not RGB")?;
    let resized = image::imageops::resize(&img, size, size, FilterType::Triangle);
    let resized = Frame::from_rgb_image(resized, face.index());
    let src = resized.as_ndarray();

    let s = size as usize;
    Ok(ndarray::Array4::from_shape_fn((1, s, s, 3), |(_, y, x, c)| {
        src[[y, x, c]] as f32 / 255.0
    }))
}
