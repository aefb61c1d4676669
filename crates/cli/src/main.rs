use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use facetag_core::annotation::infrastructure::outline_annotator::OutlineAnnotator;
use facetag_core::detection::domain::face_detector::FaceDetector;
use facetag_core::detection::domain::face_encoder::FaceEncoder;
use facetag_core::detection::infrastructure::onnx_face_detector::OnnxFaceDetector;
use facetag_core::detection::infrastructure::onnx_face_encoder::OnnxFaceEncoder;
use facetag_core::pipeline::enroll_faces_use_case::EnrollFacesUseCase;
use facetag_core::pipeline::inspect_faces_use_case::InspectFacesUseCase;
use facetag_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use facetag_core::pipeline::recognize_faces_use_case::RecognizeFacesUseCase;
use facetag_core::recognition::domain::aggregator::RobustAggregator;
use facetag_core::recognition::domain::matcher::Matcher;
use facetag_core::recognition::infrastructure::gallery_store::GalleryStore;
use facetag_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, ENCODER_MODEL_NAME, ENCODER_MODEL_URL,
};
use facetag_core::shared::model_resolver;
use facetag_core::video::domain::video_reader::VideoReader;
use facetag_core::video::domain::video_writer::VideoWriter;
use facetag_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use facetag_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use facetag_core::video::infrastructure::image_file_writer::ImageFileWriter;

/// Enroll and recognize faces in videos.
#[derive(Parser)]
#[command(name = "facetag")]
struct Cli {
    /// Directory holding enrolled reference embeddings.
    #[arg(long, global = true, default_value = "data/gallery")]
    gallery: PathBuf,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, global = true, default_value = "0.5")]
    confidence: f64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Learn one person's reference embedding from a video of them.
    Enroll {
        /// Enrollment video showing a single subject.
        video: PathBuf,

        /// Identity name to store the reference under.
        name: String,

        /// Frames to sample from the video.
        #[arg(long, default_value = "100")]
        frames: usize,

        /// Embedding distance under which two samples agree.
        #[arg(long, default_value = "0.4")]
        dist_threshold: f64,

        /// Fraction of samples that must agree for a stable reference.
        #[arg(long, default_value = "0.9")]
        ratio_threshold: f64,
    },

    /// Label faces in a video against the enrolled gallery.
    Recognize {
        /// Input video.
        video: PathBuf,

        /// Annotated output video.
        output: PathBuf,

        /// Maximum embedding distance for an accepted match.
        #[arg(long, default_value = "0.4")]
        dist_threshold: f64,

        /// Stop after this many frames (default: whole video).
        #[arg(long)]
        max_frames: Option<usize>,
    },

    /// Dump sampled frames with raw detections drawn, for detector tuning.
    Inspect {
        /// Input video.
        video: PathBuf,

        /// Directory for the annotated PNG frames.
        output_dir: PathBuf,

        /// Frames to sample from the video.
        #[arg(long, default_value = "20")]
        frames: usize,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    match cli.command {
        Command::Enroll {
            ref video,
            ref name,
            frames,
            dist_threshold,
            ratio_threshold,
        } => run_enroll(
            &cli,
            video,
            name,
            frames,
            dist_threshold,
            ratio_threshold,
        ),
        Command::Recognize {
            ref video,
            ref output,
            dist_threshold,
            max_frames,
        } => run_recognize(&cli, video, output, dist_threshold, max_frames),
        Command::Inspect {
            ref video,
            ref output_dir,
            frames,
        } => run_inspect(&cli, video, output_dir, frames),
    }
}

fn run_enroll(
    cli: &Cli,
    video: &PathBuf,
    name: &str,
    frames: usize,
    dist_threshold: f64,
    ratio_threshold: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader: Box<dyn VideoReader> = Box::new(FfmpegReader::new());
    let metadata = reader.open(video)?;

    let mut use_case = EnrollFacesUseCase::new(
        reader,
        build_detector(cli.confidence)?,
        build_encoder()?,
        RobustAggregator::new(ratio_threshold, dist_threshold),
        Box::new(StdoutPipelineLogger::default()),
    );
    let report = use_case.execute(&metadata, frames)?;

    let store = GalleryStore::new(&cli.gallery);
    let path = store.save(name, &report.reference)?;

    log::info!(
        "enrolled {name}: {} embeddings from {} sampled frames \
         ({} inliers, {} frames without a face, {} with several)",
        report.embeddings_used,
        report.frames_sampled,
        report.inliers,
        report.skipped_no_face,
        report.skipped_multi_face
    );
    log::info!("reference written to {}", path.display());
    Ok(())
}

fn run_recognize(
    cli: &Cli,
    video: &PathBuf,
    output: &PathBuf,
    dist_threshold: f64,
    max_frames: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let gallery = GalleryStore::new(&cli.gallery).load()?;
    log::info!(
        "loaded {} identities from {}",
        gallery.len(),
        cli.gallery.display()
    );

    let mut reader: Box<dyn VideoReader> = Box::new(FfmpegReader::new());
    let metadata = reader.open(video)?;
    let writer: Box<dyn VideoWriter> = Box::new(FfmpegWriter::new());

    let use_case = RecognizeFacesUseCase::new(
        reader,
        writer,
        build_detector(cli.confidence)?,
        build_encoder()?,
        Matcher::new(dist_threshold),
        gallery,
        Box::new(OutlineAnnotator::new()),
        Box::new(StdoutPipelineLogger::default()),
        max_frames,
    );
    let report = use_case.execute(&metadata, output)?;

    log::info!(
        "recognized {} of {} faces; output written to {}",
        report.faces_recognized,
        report.faces_seen,
        output.display()
    );
    Ok(())
}

fn run_inspect(
    cli: &Cli,
    video: &PathBuf,
    output_dir: &PathBuf,
    frames: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader: Box<dyn VideoReader> = Box::new(FfmpegReader::new());
    let metadata = reader.open(video)?;

    let mut use_case = InspectFacesUseCase::new(
        reader,
        build_detector(cli.confidence)?,
        Box::new(OutlineAnnotator::new()),
        Box::new(ImageFileWriter::new()),
        Box::new(StdoutPipelineLogger::default()),
    );
    let report = use_case.execute(&metadata, output_dir, frames)?;

    log::info!(
        "wrote {} annotated frames ({} detections) to {}",
        report.frames_inspected,
        report.faces_found,
        output_dir.display()
    );
    Ok(())
}

fn build_detector(confidence: f64) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> {
    log::info!("resolving detector model: {DETECTOR_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        DETECTOR_MODEL_NAME,
        DETECTOR_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    Ok(Box::new(OnnxFaceDetector::new(&model_path, confidence)?))
}

fn build_encoder() -> Result<Box<dyn FaceEncoder>, Box<dyn std::error::Error>> {
    log::info!("resolving encoder model: {ENCODER_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        ENCODER_MODEL_NAME,
        ENCODER_MODEL_URL,
        Some(Box::new(download_progress)),
    )?;
    Ok(Box::new(OnnxFaceEncoder::new(&model_path)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }

    let (video, frames) = match &cli.command {
        Command::Enroll {
            video,
            frames,
            dist_threshold,
            ratio_threshold,
            ..
        } => {
            if !(*ratio_threshold > 0.0 && *ratio_threshold <= 1.0) {
                return Err(format!(
                    "Ratio threshold must be in (0.0, 1.0], got {ratio_threshold}"
                )
                .into());
            }
            if *dist_threshold <= 0.0 {
                return Err(
                    format!("Distance threshold must be positive, got {dist_threshold}").into(),
                );
            }
            (video, Some(*frames))
        }
        Command::Recognize {
            video,
            dist_threshold,
            ..
        } => {
            if *dist_threshold <= 0.0 {
                return Err(
                    format!("Distance threshold must be positive, got {dist_threshold}").into(),
                );
            }
            (video, None)
        }
        Command::Inspect { video, frames, .. } => (video, Some(*frames)),
    };

    if !video.exists() {
        return Err(format!("Input file not found: {}", video.display()).into());
    }
    if frames == Some(0) {
        return Err("Frame count must be positive".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading model... {pct}%");
    } else {
        eprint!("\rDownloading model... {downloaded} bytes");
    }
}
