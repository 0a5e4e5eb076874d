use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::{AnnotatedFace, FrameAnnotator};
use crate::shared::constants::DEFAULT_FONT_PATHS;
use crate::shared::frame::Frame;

/// Box outline thickness in pixels.
const BOX_THICKNESS: u32 = 2;

/// Gap between a box's top edge and its caption baseline.
const CAPTION_OFFSET: i32 = 10;

const CAPTION_SCALE: f32 = 24.0;
const BANNER_SCALE: f32 = 30.0;

/// Baseline of the first banner line, and spacing between banners.
const BANNER_ORIGIN: (i32, i32) = (10, 30);
const BANNER_LINE_HEIGHT: i32 = 34;

const BANNER_COLOR: [u8; 3] = [255, 0, 0];

/// Draws rectangles and captions with `imageproc`.
///
/// Text needs a TrueType font. Without one, boxes are still drawn and
/// captions are skipped.
pub struct OverlayAnnotator {
    font: Option<FontVec>,
}

impl OverlayAnnotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self { font }
    }

    /// Loads the first readable font from `explicit` or the platform defaults.
    pub fn with_font_search(explicit: Option<&Path>) -> Self {
        let candidates = explicit
            .map(Path::to_path_buf)
            .into_iter()
            .chain(DEFAULT_FONT_PATHS.iter().map(PathBuf::from));

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("Annotation font: {}", path.display());
                    return Self::new(Some(font));
                }
                Err(e) => log::warn!("Ignoring font {}: {e}", path.display()),
            }
        }

        log::warn!("No usable font found; annotations will not include text");
        Self::new(None)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn draw_face(&self, img: &mut RgbImage, face: &AnnotatedFace) {
        let Some(r) = face.region.clamp_to(img.width(), img.height()) else {
            return;
        };
        let color = Rgb(face.verdict.label.color());

        for inset in 0..BOX_THICKNESS {
            let w = r.width as u32;
            let h = r.height as u32;
            if w <= inset * 2 || h <= inset * 2 {
                break;
            }
            let rect = Rect::at(r.x + inset as i32, r.y + inset as i32)
                .of_size(w - inset * 2, h - inset * 2);
            draw_hollow_rect_mut(img, rect, color);
        }

        if let Some(font) = &self.font {
            let caption = face.verdict.caption();
            let scale = PxScale::from(CAPTION_SCALE);
            let (_, text_h) = text_size(scale, font, &caption);
            let top = (r.y - CAPTION_OFFSET - text_h as i32).max(0);
            draw_text_mut(img, color, r.x, top, scale, font, &caption);
        }
    }

    fn draw_banners(&self, img: &mut RgbImage, banners: &[String]) {
        let Some(font) = &self.font else {
            return;
        };
        let scale = PxScale::from(BANNER_SCALE);
        let (x, baseline) = BANNER_ORIGIN;
        for (i, banner) in banners.iter().enumerate() {
            let (_, text_h) = text_size(scale, font, banner);
            let top = (baseline + i as i32 * BANNER_LINE_HEIGHT - text_h as i32).max(0);
            draw_text_mut(img, Rgb(BANNER_COLOR), x, top, scale, font, banner);
        }
    }
}

impl FrameAnnotator for OverlayAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        faces: &[AnnotatedFace],
        banners: &[String],
    ) -> Result<(), Box<dyn std::error::Error>> {
        if faces.is_empty() && (banners.is_empty() || self.font.is_none()) {
            return Ok(());
        }

        let mut img = frame
            .to_rgb_image()
            .ok_or("Annotation requires an RGB frame")?;

        for face in faces {
            self.draw_face(&mut img, face);
        }
        self.draw_banners(&mut img, banners);

        frame.data_mut().copy_from_slice(img.as_raw());
        Ok(())
    }
}
