pub mod demo_mask_classifier;
pub mod onnx_mask_classifier;
