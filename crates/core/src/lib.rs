//! Face enrollment and recognition from video.
//!
//! The interesting parts live in `recognition::domain`: an
//! outlier-rejecting aggregator that turns many noisy per-frame embeddings
//! into one reference embedding, and a nearest-neighbor matcher that
//! decides probe identity against the enrolled gallery. Everything else is
//! plumbing around those two: ONNX detection/encoding, ffmpeg video I/O,
//! and the enroll/recognize/inspect pipelines.

pub mod annotation;
pub mod detection;
pub mod pipeline;
pub mod recognition;
pub mod shared;
pub mod video;
