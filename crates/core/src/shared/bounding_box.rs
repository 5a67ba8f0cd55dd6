/// A face rectangle in normalized frame coordinates (0.0–1.0 on both axes).
///
/// Normalized boxes are independent of the resolution the detector ran at,
/// so the box area is directly the fraction of the frame the face covers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Builds a box, ordering the corners and clamping them into the unit square.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Self {
        let (x0, x1) = ordered(x_min, x_max);
        let (y0, y1) = ordered(y_min, y_max);
        Self {
            x_min: unit(x0),
            y_min: unit(y0),
            x_max: unit(x1),
            y_max: unit(y1),
        }
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Box area divided by frame area.
    pub fn area_ratio(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn to_pixel_rect(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x = (self.x_min * fw).floor() as u32;
        let y = (self.y_min * fh).floor() as u32;
        let x2 = (self.x_max * fw).ceil() as u32;
        let y2 = (self.y_max * fh).ceil() as u32;
        PixelRect::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y))
            .clipped(frame_width, frame_height)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x_min.max(other.x_min);
        let iy1 = self.y_min.max(other.y_min);
        let ix2 = self.x_max.min(other.x_max);
        let iy2 = self.y_max.min(other.y_max);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area_ratio() + other.area_ratio() - inter)
    }
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

fn unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// An integer pixel rectangle inside a concrete frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full(frame_width: u32, frame_height: u32) -> Self {
        Self::new(0, 0, frame_width, frame_height)
    }

    /// Grows the rectangle by `pad` pixels on every side, staying inside the frame.
    pub fn padded(&self, pad: u32, frame_width: u32, frame_height: u32) -> Self {
        let x = self.x.saturating_sub(pad);
        let y = self.y.saturating_sub(pad);
        let x2 = (self.x + self.width).saturating_add(pad).min(frame_width);
        let y2 = (self.y + self.height).saturating_add(pad).min(frame_height);
        Self::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y))
    }

    pub fn clipped(&self, frame_width: u32, frame_height: u32) -> Self {
        let x = self.x.min(frame_width);
        let y = self.y.min(frame_height);
        let width = self.width.min(frame_width - x);
        let height = self.height.min(frame_height - y);
        Self::new(x, y, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_new_orders_and_clamps() {
        let b = BoundingBox::new(0.8, 1.4, -0.2, 0.5);
        assert_relative_eq!(b.x_min, 0.0);
        assert_relative_eq!(b.x_max, 0.8);
        assert_relative_eq!(b.y_min, 0.5);
        assert_relative_eq!(b.y_max, 1.0);
    }

    #[test]
    fn test_nan_coordinates_collapse_to_zero() {
        let b = BoundingBox::new(f64::NAN, 0.0, 0.5, 0.5);
        assert_relative_eq!(b.x_min, 0.0);
    }

    #[test]
    fn test_area_ratio_matches_pixel_fraction() {
        // 64x48 face in a 640x480 frame covers 1% of the frame
        let b = BoundingBox::new(100.0 / 640.0, 100.0 / 480.0, 164.0 / 640.0, 148.0 / 480.0);
        assert_relative_eq!(b.area_ratio(), 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_to_pixel_rect() {
        let b = BoundingBox::new(0.25, 0.5, 0.75, 1.0);
        assert_eq!(b.to_pixel_rect(100, 40), PixelRect::new(25, 20, 50, 20));
    }

    #[test]
    fn test_iou_identical() {
        let b = BoundingBox::new(0.1, 0.1, 0.5, 0.5);
        assert_relative_eq!(b.iou(&b), 1.0);
    }

    #[rstest]
    #[case::disjoint(BoundingBox::new(0.0, 0.0, 0.2, 0.2), BoundingBox::new(0.5, 0.5, 0.7, 0.7), 0.0)]
    #[case::touching(BoundingBox::new(0.0, 0.0, 0.5, 0.5), BoundingBox::new(0.5, 0.0, 1.0, 0.5), 0.0)]
    #[case::half_overlap(BoundingBox::new(0.0, 0.0, 0.4, 0.4), BoundingBox::new(0.2, 0.0, 0.6, 0.4), 1.0 / 3.0)]
    fn test_iou_cases(#[case] a: BoundingBox, #[case] b: BoundingBox, #[case] expected: f64) {
        assert_relative_eq!(a.iou(&b), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_padded_stays_in_frame() {
        let r = PixelRect::new(5, 5, 10, 10).padded(10, 20, 18);
        assert_eq!(r, PixelRect::new(0, 0, 20, 18));
    }

    #[test]
    fn test_clipped() {
        let r = PixelRect::new(90, 10, 50, 50).clipped(100, 40);
        assert_eq!(r, PixelRect::new(90, 10, 10, 30));
        assert!(PixelRect::new(200, 0, 5, 5).clipped(100, 100).is_empty());
    }
}
