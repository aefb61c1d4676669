use crate::shared::bounding_box::BoundingBox;
use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

/// Domain interface for turning one detected face into an [`Embedding`].
///
/// Every call must produce the same fixed dimensionality; embeddings from
/// different encoder models are not comparable.
pub trait FaceEncoder: Send {
    fn encode(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
    ) -> Result<Embedding, Box<dyn std::error::Error>>;
}
