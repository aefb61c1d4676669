use std::time::Instant;

use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_encoder::FaceEncoder;
use crate::pipeline::frame_sampler::FrameSampler;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::recognition::domain::aggregator::RobustAggregator;
use crate::shared::embedding::Embedding;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Outcome of an enrollment run.
///
/// The skipped counters make the sample size meaningful to the operator:
/// `embeddings_used` can be far below the frame budget when the subject is
/// off-screen or sharing the frame.
#[derive(Debug)]
pub struct EnrollReport {
    pub frames_sampled: usize,
    pub skipped_no_face: usize,
    pub skipped_multi_face: usize,
    pub embeddings_used: usize,
    /// Embeddings that survived outlier rejection.
    pub inliers: usize,
    pub reference: Embedding,
}

/// Builds one reference embedding for a single person from a video.
///
/// Samples frames evenly across the video, keeps only frames showing
/// exactly one face (zero- and multi-face frames are counted and skipped;
/// enrollment footage is assumed to star its subject alone), encodes each
/// kept face, and lets the robust aggregator reject the stragglers.
///
/// Aggregation failure is enrollment failure: nothing is returned for the
/// caller to store.
pub struct EnrollFacesUseCase {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
    aggregator: RobustAggregator,
    logger: Box<dyn PipelineLogger>,
}

impl EnrollFacesUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn FaceDetector>,
        encoder: Box<dyn FaceEncoder>,
        aggregator: RobustAggregator,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            detector,
            encoder,
            aggregator,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        frame_budget: usize,
    ) -> Result<EnrollReport, Box<dyn std::error::Error>> {
        let Self {
            reader,
            detector,
            encoder,
            aggregator,
            logger,
        } = self;

        let mut sampler = FrameSampler::new(metadata.total_frames, frame_budget);
        let mut embeddings: Vec<Embedding> = Vec::new();
        let mut skipped_no_face = 0usize;
        let mut skipped_multi_face = 0usize;
        let total = metadata.total_frames;

        for frame_result in reader.frames() {
            let frame = frame_result?;
            if !sampler.accepts(frame.index()) {
                continue;
            }

            let started = Instant::now();
            let faces = detector.detect(&frame)?;
            logger.timing("detect", started.elapsed().as_secs_f64() * 1000.0);

            match faces.as_slice() {
                [] => skipped_no_face += 1,
                [face] => {
                    let started = Instant::now();
                    embeddings.push(encoder.encode(&frame, face)?);
                    logger.timing("encode", started.elapsed().as_secs_f64() * 1000.0);
                }
                _ => skipped_multi_face += 1,
            }

            logger.progress(frame.index() + 1, total);
        }
        reader.close();

        let frames_sampled = sampler.taken();
        logger.info(&format!(
            "sampled {frames_sampled} frames: {} usable, \
             {skipped_no_face} without a face, {skipped_multi_face} with several",
            embeddings.len()
        ));

        let consensus = aggregator.aggregate(&embeddings)?;
        logger.info(&format!(
            "consensus over {} of {} embeddings after {} trials",
            consensus.inliers,
            embeddings.len(),
            consensus.trials
        ));

        Ok(EnrollReport {
            frames_sampled,
            skipped_no_face,
            skipped_multi_face,
            embeddings_used: embeddings.len(),
            inliers: consensus.inliers,
            reference: consensus.embedding,
        })
    }
}
