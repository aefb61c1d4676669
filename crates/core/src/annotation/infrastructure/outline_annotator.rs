use crate::annotation::domain::frame_annotator::{FaceLabel, FrameAnnotator};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Outline thickness in pixels.
const BORDER: u32 = 2;

/// Height of the filled strip drawn under a recognized face.
const STRIP_HEIGHT: u32 = 6;

/// Color used for faces without a gallery match.
const UNKNOWN_COLOR: [u8; 3] = [220, 40, 40];

/// Colors assigned to recognized identities, keyed by name hash.
const IDENTITY_COLORS: [[u8; 3]; 6] = [
    [40, 180, 90],
    [50, 120, 220],
    [230, 180, 40],
    [170, 80, 210],
    [40, 200, 200],
    [240, 130, 60],
];

/// CPU overlay renderer: a rectangle outline per face, plus a filled label
/// strip along the bottom edge for recognized identities.
///
/// Identity names are not rasterized (no font stack); each identity gets a
/// stable color instead, and the name/distance pair travels through the
/// pipeline logger.
pub struct OutlineAnnotator;

impl OutlineAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OutlineAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnnotator for OutlineAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        labels: &[FaceLabel],
    ) -> Result<(), Box<dyn std::error::Error>> {
        for label in labels {
            let color = match &label.decision {
                Some(m) => identity_color(&m.name),
                None => UNKNOWN_COLOR,
            };
            draw_outline(frame, &label.face, color);
            if label.decision.is_some() {
                draw_strip(frame, &label.face, color);
            }
        }
        Ok(())
    }
}

/// Stable per-identity color from a small palette (FNV-1a over the name).
pub fn identity_color(name: &str) -> [u8; 3] {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in name.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100_0000_01b3);
    }
    IDENTITY_COLORS[(hash % IDENTITY_COLORS.len() as u64) as usize]
}

fn draw_outline(frame: &mut Frame, face: &BoundingBox, color: [u8; 3]) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let x1 = face.x;
    let y1 = face.y;
    let x2 = face.x + face.width;
    let y2 = face.y + face.height;

    for t in 0..BORDER as i32 {
        draw_hline(frame, x1, x2, y1 + t, fw, fh, color);
        draw_hline(frame, x1, x2, y2 - 1 - t, fw, fh, color);
        draw_vline(frame, y1, y2, x1 + t, fw, fh, color);
        draw_vline(frame, y1, y2, x2 - 1 - t, fw, fh, color);
    }
}

/// Filled bar just below the box, clamped inside the frame.
fn draw_strip(frame: &mut Frame, face: &BoundingBox, color: [u8; 3]) {
    let (fw, fh) = (frame.width() as i32, frame.height() as i32);
    let y_start = face.y + face.height;
    for dy in 0..STRIP_HEIGHT as i32 {
        draw_hline(frame, face.x, face.x + face.width, y_start + dy, fw, fh, color);
    }
}

fn draw_hline(frame: &mut Frame, x1: i32, x2: i32, y: i32, fw: i32, fh: i32, color: [u8; 3]) {
    if y < 0 || y >= fh {
        return;
    }
    for x in x1.max(0)..x2.min(fw) {
        frame.set_pixel(x as u32, y as u32, color);
    }
}

fn draw_vline(frame: &mut Frame, y1: i32, y2: i32, x: i32, fw: i32, fh: i32, color: [u8; 3]) {
    if x < 0 || x >= fw {
        return;
    }
    for y in y1.max(0)..y2.min(fh) {
        frame.set_pixel(x as u32, y as u32, color);
    }
}
