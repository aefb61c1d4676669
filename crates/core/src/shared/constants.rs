pub const DETECTOR_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const ENCODER_MODEL_NAME: &str = "w600k_r50.onnx";
pub const ENCODER_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Euclidean distance under which two embeddings count as the same identity.
/// Shared by the aggregator's inlier test and the matcher's acceptance test.
pub const DEFAULT_DIST_THRESHOLD: f64 = 0.4;

/// Fraction of an enrollment set that must agree before the aggregator
/// accepts a candidate center.
pub const DEFAULT_RATIO_THRESHOLD: f64 = 0.9;

/// Frames sampled from an enrollment video by default.
pub const DEFAULT_FRAME_BUDGET: usize = 100;

pub const GALLERY_FILE_EXTENSION: &str = "json";
