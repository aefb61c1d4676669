use crate::recognition::domain::matcher::Match;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One detected face with its recognition outcome; `decision` is `None`
/// for faces the matcher rejected (rendered as unknown).
#[derive(Clone, Debug)]
pub struct FaceLabel {
    pub face: BoundingBox,
    pub decision: Option<Match>,
}

/// Draws per-face overlays onto a frame before it is written out.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        labels: &[FaceLabel],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
