/// An axis-aligned face bounding box in frame pixel coordinates.
///
/// Detectors may report boxes that spill past the frame edges; callers
/// clamp before cropping or reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersects the region with a `frame_width × frame_height` frame.
    ///
    /// Returns `None` when nothing of the region is visible.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = (self.x.saturating_add(self.width)).min(frame_width as i32);
        let y2 = (self.y.saturating_add(self.height)).min(frame_height as i32);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Region::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// True when both sides reach the minimum size.
    pub fn is_at_least(&self, min_width: u32, min_height: u32) -> bool {
        self.width >= min_width as i32 && self.height >= min_height as i32
    }

    /// `[x, y, width, height]`, the wire format for detections.
    pub fn to_bbox(&self) -> [i32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_clamp_inside_is_identity() {
        let r = Region::new(10, 20, 30, 40);
        assert_eq!(r.clamp_to(100, 100), Some(r));
    }

    #[test]
    fn test_clamp_left_top_overflow() {
        let r = Region::new(-10, -5, 30, 20);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(0, 0, 20, 15)));
    }

    #[test]
    fn test_clamp_right_bottom_overflow() {
        let r = Region::new(90, 80, 30, 40);
        assert_eq!(r.clamp_to(100, 100), Some(Region::new(90, 80, 10, 20)));
    }

    #[rstest]
    #[case::fully_right(Region::new(150, 10, 20, 20))]
    #[case::fully_above(Region::new(10, -50, 20, 20))]
    #[case::zero_width(Region::new(10, 10, 0, 20))]
    #[case::negative_height(Region::new(10, 10, 20, -3))]
    fn test_clamp_invisible_is_none(#[case] r: Region) {
        assert!(r.clamp_to(100, 100).is_none());
    }

    #[rstest]
    #[case(60, 60, true)]
    #[case(59, 60, false)]
    #[case(60, 59, false)]
    #[case(200, 61, true)]
    fn test_is_at_least(#[case] w: i32, #[case] h: i32, #[case] expected: bool) {
        assert_eq!(Region::new(0, 0, w, h).is_at_least(60, 60), expected);
    }

    #[test]
    fn test_to_bbox_order() {
        assert_eq!(Region::new(1, 2, 3, 4).to_bbox(), [1, 2, 3, 4]);
    }
}
