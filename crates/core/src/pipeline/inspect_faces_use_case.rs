use std::fs;
use std::path::Path;

use crate::annotation::domain::frame_annotator::{FaceLabel, FrameAnnotator};
use crate::detection::domain::face_detector::FaceDetector;
use crate::pipeline::frame_sampler::FrameSampler;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::image_writer::ImageWriter;
use crate::video::domain::video_reader::VideoReader;

#[derive(Debug)]
pub struct InspectReport {
    pub frames_inspected: usize,
    pub faces_found: usize,
}

/// Detector sanity check: samples frames from a video, draws the raw
/// detections, and dumps each annotated frame as `<frame_index>.png`.
///
/// No encoding and no matching; this exists to eyeball detector behavior
/// (missed faces, double boxes, threshold tuning) before enrolling anyone.
pub struct InspectFacesUseCase {
    reader: Box<dyn VideoReader>,
    detector: Box<dyn FaceDetector>,
    annotator: Box<dyn FrameAnnotator>,
    image_writer: Box<dyn ImageWriter>,
    logger: Box<dyn PipelineLogger>,
}

impl InspectFacesUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        detector: Box<dyn FaceDetector>,
        annotator: Box<dyn FrameAnnotator>,
        image_writer: Box<dyn ImageWriter>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            reader,
            detector,
            annotator,
            image_writer,
            logger,
        }
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        output_dir: &Path,
        frame_budget: usize,
    ) -> Result<InspectReport, Box<dyn std::error::Error>> {
        let Self {
            reader,
            detector,
            annotator,
            image_writer,
            logger,
        } = self;

        fs::create_dir_all(output_dir)?;

        let mut sampler = FrameSampler::new(metadata.total_frames, frame_budget);
        let mut faces_found = 0usize;
        let total = metadata.total_frames;

        for frame_result in reader.frames() {
            let mut frame = frame_result?;
            if !sampler.accepts(frame.index()) {
                continue;
            }

            let faces = detector.detect(&frame)?;
            faces_found += faces.len();

            let labels: Vec<FaceLabel> = faces
                .into_iter()
                .map(|face| FaceLabel {
                    face,
                    decision: None,
                })
                .collect();
            annotator.annotate(&mut frame, &labels)?;

            let path = output_dir.join(format!("{}.png", frame.index()));
            image_writer.write(&path, &frame)?;

            logger.progress(frame.index() + 1, total);
        }
        reader.close();

        let frames_inspected = sampler.taken();
        logger.info(&format!(
            "inspected {frames_inspected} frames, {faces_found} face detections"
        ));

        Ok(InspectReport {
            frames_inspected,
            faces_found,
        })
    }
}
