use std::path::Path;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::{FaceLabel, FrameAnnotator};
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_encoder::FaceEncoder;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::matcher::Matcher;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const CHANNEL_CAPACITY: usize = 8;

type SendableError = Box<dyn std::error::Error + Send + Sync>;

/// Per-frame payload leaving the recognizer stage: the frame, its labeled
/// faces, and how long detection + encoding + matching took.
type Recognized = (Frame, Vec<FaceLabel>, f64);

#[derive(Debug)]
pub struct RecognizeReport {
    pub frames_processed: usize,
    pub faces_seen: usize,
    pub faces_recognized: usize,
}

/// Labels every face in a video against the enrolled gallery and writes an
/// annotated copy.
///
/// Stage layout: `reader → recognizer [detect/encode/match] → main
/// [annotate/progress] → writer`, over bounded channels so I/O and
/// inference overlap. Channels preserve frame order end to end, so the
/// output video needs no re-sorting.
///
/// Every face is matched independently against the full gallery; two faces
/// in one frame can both resolve to the same identity.
pub struct RecognizeFacesUseCase {
    reader: Box<dyn VideoReader>,
    writer: Box<dyn VideoWriter>,
    detector: Box<dyn FaceDetector>,
    encoder: Box<dyn FaceEncoder>,
    matcher: Matcher,
    gallery: Gallery,
    annotator: Box<dyn FrameAnnotator>,
    logger: Box<dyn PipelineLogger>,
    /// Stop after this many frames; `None` processes the whole video.
    max_frames: Option<usize>,
}

impl RecognizeFacesUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn FaceDetector>,
        encoder: Box<dyn FaceEncoder>,
        matcher: Matcher,
        gallery: Gallery,
        annotator: Box<dyn FrameAnnotator>,
        logger: Box<dyn PipelineLogger>,
        max_frames: Option<usize>,
    ) -> Self {
        Self {
            reader,
            writer,
            detector,
            encoder,
            matcher,
            gallery,
            annotator,
            logger,
            max_frames,
        }
    }

    pub fn execute(
        mut self,
        metadata: &VideoMetadata,
        output_path: &Path,
    ) -> Result<RecognizeReport, Box<dyn std::error::Error>> {
        if self.gallery.is_empty() {
            self.logger
                .info("gallery is empty: every face will be labeled unknown");
        }

        self.writer.open(output_path, metadata)?;

        let total = match self.max_frames {
            Some(limit) if metadata.total_frames > 0 => limit.min(metadata.total_frames),
            Some(limit) => limit,
            None => metadata.total_frames,
        };

        let (frame_tx, frame_rx) =
            crossbeam_channel::bounded::<Result<Frame, SendableError>>(CHANNEL_CAPACITY);
        let (labeled_tx, labeled_rx) =
            crossbeam_channel::bounded::<Result<Recognized, SendableError>>(CHANNEL_CAPACITY);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(CHANNEL_CAPACITY);

        let reader_handle = spawn_reader(self.reader, frame_tx, self.max_frames);
        let recognizer_handle = spawn_recognizer(
            self.detector,
            self.encoder,
            self.matcher,
            self.gallery,
            frame_rx,
            labeled_tx,
        );
        let writer_handle = spawn_writer(self.writer, write_rx);

        let mut report = RecognizeReport {
            frames_processed: 0,
            faces_seen: 0,
            faces_recognized: 0,
        };

        let mut first_error: Option<Box<dyn std::error::Error>> = None;
        for labeled_result in labeled_rx {
            let (mut frame, labels, recognize_ms) = match labeled_result {
                Ok(payload) => payload,
                Err(e) => {
                    first_error = Some(e.to_string().into());
                    break;
                }
            };

            self.logger.timing("recognize", recognize_ms);

            let started = Instant::now();
            if let Err(e) = self.annotator.annotate(&mut frame, &labels) {
                first_error = Some(e);
                break;
            }
            self.logger
                .timing("annotate", started.elapsed().as_secs_f64() * 1000.0);

            report.faces_seen += labels.len();
            for label in &labels {
                match &label.decision {
                    Some(m) => {
                        report.faces_recognized += 1;
                        log::debug!(
                            "frame {}: {} at distance {:.3}",
                            frame.index(),
                            m.name,
                            m.distance
                        );
                    }
                    None => log::debug!("frame {}: unknown face", frame.index()),
                }
            }

            if write_tx.send(frame).is_err() {
                first_error = Some("writer channel closed unexpectedly".into());
                break;
            }

            report.frames_processed += 1;
            self.logger.progress(report.frames_processed, total);
        }

        // Unblocks upstream senders if the loop bailed early
        drop(labeled_rx);
        drop(write_tx);

        join_threads(reader_handle, recognizer_handle, writer_handle, first_error)?;

        self.logger.info(&format!(
            "recognized {} of {} faces across {} frames",
            report.faces_recognized, report.faces_seen, report.frames_processed
        ));
        self.logger.summary();

        Ok(report)
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: crossbeam_channel::Sender<Result<Frame, SendableError>>,
    max_frames: Option<usize>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let limit = max_frames.unwrap_or(usize::MAX);
        for frame_result in reader.frames().take(limit) {
            let mapped = frame_result.map_err(|e| -> SendableError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() {
                break;
            }
        }
        reader.close();
    })
}

fn spawn_recognizer(
    mut detector: Box<dyn FaceDetector>,
    mut encoder: Box<dyn FaceEncoder>,
    matcher: Matcher,
    gallery: Gallery,
    frame_rx: crossbeam_channel::Receiver<Result<Frame, SendableError>>,
    labeled_tx: crossbeam_channel::Sender<Result<Recognized, SendableError>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for frame_result in frame_rx {
            let result = frame_result.and_then(|frame| {
                let started = Instant::now();
                let labels = recognize_frame(
                    detector.as_mut(),
                    encoder.as_mut(),
                    &matcher,
                    &gallery,
                    &frame,
                )
                .map_err(|e| -> SendableError { e.to_string().into() })?;
                let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
                Ok((frame, labels, elapsed_ms))
            });

            if labeled_tx.send(result).is_err() {
                break;
            }
        }
    })
}

/// Detects, encodes, and matches every face in one frame.
fn recognize_frame(
    detector: &mut dyn FaceDetector,
    encoder: &mut dyn FaceEncoder,
    matcher: &Matcher,
    gallery: &Gallery,
    frame: &Frame,
) -> Result<Vec<FaceLabel>, Box<dyn std::error::Error>> {
    let faces = detector.detect(frame)?;
    let mut labels = Vec::with_capacity(faces.len());
    for face in faces {
        let probe = encoder.encode(frame, &face)?;
        let decision = matcher.best_match(&probe, gallery);
        labels.push(FaceLabel { face, decision });
    }
    Ok(labels)
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: crossbeam_channel::Receiver<Frame>,
) -> std::thread::JoinHandle<Result<Box<dyn VideoWriter>, SendableError>> {
    std::thread::spawn(move || {
        for frame in write_rx {
            writer
                .write(&frame)
                .map_err(|e| -> SendableError { e.to_string().into() })?;
        }
        Ok(writer)
    })
}

/// Joins all pipeline threads and coalesces the first error encountered.
fn join_threads(
    reader_handle: std::thread::JoinHandle<()>,
    recognizer_handle: std::thread::JoinHandle<()>,
    writer_handle: std::thread::JoinHandle<Result<Box<dyn VideoWriter>, SendableError>>,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<(), Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    if reader_handle.join().is_err() {
        set_if_none(&mut first_error, "reader thread panicked".into());
    }

    if recognizer_handle.join().is_err() {
        set_if_none(&mut first_error, "recognizer thread panicked".into());
    }

    match writer_handle.join() {
        Ok(Ok(mut writer)) => {
            if let Err(e) = writer.close() {
                set_if_none(&mut first_error, e);
            }
        }
        Ok(Err(e)) => set_if_none(&mut first_error, e.to_string().into()),
        Err(_) => set_if_none(&mut first_error, "writer thread panicked".into()),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use crate::annotation::infrastructure::outline_annotator::OutlineAnnotator;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::embedding::Embedding;

    // --- Stubs ---

    struct StubReader {
        frames: Vec<Frame>,
    }

    impl VideoReader for StubReader {
        fn open(&mut self, _path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
            unimplemented!("tests construct metadata directly")
        }

        fn frames(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
            Box::new(self.frames.drain(..).map(Ok))
        }

        fn close(&mut self) {}
    }

    struct StubWriter {
        written: Arc<Mutex<Vec<usize>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl VideoWriter for StubWriter {
        fn open(
            &mut self,
            _path: &Path,
            _metadata: &VideoMetadata,
        ) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }

        fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.written.lock().unwrap().push(frame.index());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct StubDetector {
        faces_per_frame: HashMap<usize, usize>,
    }

    impl FaceDetector for StubDetector {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            let count = self.faces_per_frame.get(&frame.index()).copied().unwrap_or(0);
            Ok((0..count)
                .map(|i| BoundingBox {
                    x: 12 * i as i32,
                    y: 4,
                    width: 8,
                    height: 8,
                    confidence: 0.9,
                })
                .collect())
        }
    }

    /// First face in a frame encodes near "alice", the rest far from
    /// everything.
    struct StubEncoder;

    impl FaceEncoder for StubEncoder {
        fn encode(
            &mut self,
            _frame: &Frame,
            face: &BoundingBox,
        ) -> Result<Embedding, Box<dyn std::error::Error>> {
            if face.x == 0 {
                Ok(Embedding::new(vec![1.0, 0.0]))
            } else {
                Ok(Embedding::new(vec![-5.0, 5.0]))
            }
        }
    }

    struct FailingDetector;

    impl FaceDetector for FailingDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
            Err("detector exploded".into())
        }
    }

    // --- Helpers ---

    fn make_frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 32 * 32 * 3], 32, 32, index)
    }

    fn metadata(total: usize) -> VideoMetadata {
        VideoMetadata {
            width: 32,
            height: 32,
            fps: 30.0,
            total_frames: total,
            codec: String::new(),
            source_path: None,
        }
    }

    fn alice_gallery() -> Gallery {
        let mut gallery = Gallery::new();
        gallery.insert("alice".into(), Embedding::new(vec![1.0, 0.1]));
        gallery
    }

    #[allow(clippy::type_complexity)]
    fn run(
        frames: Vec<Frame>,
        detector: Box<dyn FaceDetector>,
        gallery: Gallery,
        max_frames: Option<usize>,
    ) -> (
        Result<RecognizeReport, Box<dyn std::error::Error>>,
        Arc<Mutex<Vec<usize>>>,
        Arc<Mutex<bool>>,
    ) {
        let written = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(false));
        let total = frames.len();

        let uc = RecognizeFacesUseCase::new(
            Box::new(StubReader { frames }),
            Box::new(StubWriter {
                written: written.clone(),
                closed: closed.clone(),
            }),
            detector,
            Box::new(StubEncoder),
            Matcher::new(0.4),
            gallery,
            Box::new(OutlineAnnotator::new()),
            Box::new(NullPipelineLogger),
            max_frames,
        );

        let result = uc.execute(&metadata(total), Path::new("/tmp/out.mp4"));
        (result, written, closed)
    }

    #[test]
    fn test_labels_and_writes_every_frame_in_order() {
        let frames: Vec<Frame> = (0..6).map(make_frame).collect();
        let faces: HashMap<usize, usize> = (0..6).map(|i| (i, 1)).collect();

        let (result, written, closed) = run(
            frames,
            Box::new(StubDetector {
                faces_per_frame: faces,
            }),
            alice_gallery(),
            None,
        );

        let report = result.unwrap();
        assert_eq!(report.frames_processed, 6);
        assert_eq!(report.faces_seen, 6);
        assert_eq!(report.faces_recognized, 6);
        assert_eq!(*written.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_faces_match_independently_within_a_frame() {
        // Frame 0 has two faces: one near alice, one near nothing
        let frames = vec![make_frame(0)];
        let faces = HashMap::from([(0, 2)]);

        let (result, _, _) = run(
            frames,
            Box::new(StubDetector {
                faces_per_frame: faces,
            }),
            alice_gallery(),
            None,
        );

        let report = result.unwrap();
        assert_eq!(report.faces_seen, 2);
        assert_eq!(report.faces_recognized, 1);
    }

    #[test]
    fn test_empty_gallery_labels_everything_unknown() {
        let frames: Vec<Frame> = (0..3).map(make_frame).collect();
        let faces: HashMap<usize, usize> = (0..3).map(|i| (i, 1)).collect();

        let (result, _, _) = run(
            frames,
            Box::new(StubDetector {
                faces_per_frame: faces,
            }),
            Gallery::new(),
            None,
        );

        let report = result.unwrap();
        assert_eq!(report.faces_seen, 3);
        assert_eq!(report.faces_recognized, 0);
    }

    #[test]
    fn test_max_frames_limits_processing() {
        let frames: Vec<Frame> = (0..10).map(make_frame).collect();
        let faces: HashMap<usize, usize> = (0..10).map(|i| (i, 1)).collect();

        let (result, written, _) = run(
            frames,
            Box::new(StubDetector {
                faces_per_frame: faces,
            }),
            alice_gallery(),
            Some(4),
        );

        let report = result.unwrap();
        assert_eq!(report.frames_processed, 4);
        assert_eq!(*written.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_detector_failure_surfaces_as_error() {
        let frames = vec![make_frame(0)];

        let (result, _, _) = run(
            frames,
            Box::new(FailingDetector),
            alice_gallery(),
            None,
        );

        let err = result.unwrap_err();
        assert!(err.to_string().contains("detector exploded"));
    }

    #[test]
    fn test_frames_without_faces_still_pass_through() {
        let frames: Vec<Frame> = (0..3).map(make_frame).collect();

        let (result, written, _) = run(
            frames,
            Box::new(StubDetector {
                faces_per_frame: HashMap::new(),
            }),
            alice_gallery(),
            None,
        );

        let report = result.unwrap();
        assert_eq!(report.frames_processed, 3);
        assert_eq!(report.faces_seen, 0);
        assert_eq!(written.lock().unwrap().len(), 3);
    }
}
