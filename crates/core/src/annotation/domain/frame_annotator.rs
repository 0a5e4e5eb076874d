use crate::classification::domain::mask_verdict::MaskVerdict;
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// A face to draw: where it is and what the classifier said about it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnnotatedFace {
    pub region: Region,
    pub verdict: MaskVerdict,
}

/// Domain interface for drawing results onto a frame.
///
/// Implementations modify the frame in-place. `banners` are status lines
/// such as "Model not loaded", drawn in the top-left corner.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(
        &self,
        frame: &mut Frame,
        faces: &[AnnotatedFace],
        banners: &[String],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
