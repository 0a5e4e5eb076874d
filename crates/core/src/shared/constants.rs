/// Default file name of the mask classifier (ONNX export of the Keras model).
pub const MASK_MODEL_NAME: &str = "best_mask_model.onnx";

/// Default file name of the BlazeFace face detector.
pub const DETECTOR_MODEL_NAME: &str = "blazeface.onnx";

/// Mask classifier input resolution (square, NHWC).
pub const CLASSIFIER_INPUT_SIZE: u32 = 224;

/// Probabilities strictly below this are "Mask"; at or above are "No Mask".
pub const DEFAULT_MASK_THRESHOLD: f32 = 0.5;

/// Faces narrower or shorter than this many pixels are skipped.
pub const DEFAULT_MIN_FACE_SIZE: u32 = 60;

/// JPEG quality for annotated upload/frame responses.
pub const UPLOAD_JPEG_QUALITY: u8 = 90;

/// JPEG quality for the MJPEG camera stream.
pub const STREAM_JPEG_QUALITY: u8 = 75;

/// Requested capture geometry for the server-side camera.
pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;
pub const CAMERA_FPS: u32 = 24;

/// Maximum accepted encoded image size (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tif", "tiff"];

/// TrueType fonts probed for annotation text when none is configured.
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];
