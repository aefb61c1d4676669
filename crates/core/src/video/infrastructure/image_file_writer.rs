use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Saves frames as image files via the `image` crate; format follows the
/// file extension (`.png`, `.jpg`, ...).
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let buffer: image::RgbImage =
            image::ImageBuffer::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                .ok_or("frame buffer does not match its dimensions")?;
        buffer.save(path)?;
        Ok(())
    }
}
