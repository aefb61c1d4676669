/// An axis-aligned face detection in frame pixel coordinates.
///
/// Coordinates may extend past the frame edges (detectors can place boxes
/// partially off-screen); consumers clamp as needed.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

impl BoundingBox {
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        inter / (area_a + area_b - inter)
    }

    /// Square region centered on this box, clamped to `(frame_w, frame_h)`.
    ///
    /// Returns `(x1, y1, x2, y2)` with `x2`/`y2` exclusive. The side length
    /// follows the larger box dimension so crops keep the whole face.
    pub fn square_in_frame(&self, frame_w: u32, frame_h: u32) -> (u32, u32, u32, u32) {
        let cx = self.x + self.width / 2;
        let cy = self.y + self.height / 2;
        let half = self.width.max(self.height) / 2;

        let x1 = (cx - half).max(0) as u32;
        let y1 = (cy - half).max(0) as u32;
        let x2 = ((cx + half).max(0) as u32).min(frame_w);
        let y2 = ((cy + half).max(0) as u32).min(frame_h);
        (x1, y1, x2.max(x1), y2.max(y1))
    }
}
