/// ArcFace embedding extractor running on ONNX Runtime via `ort`.
///
/// Crops a square around the detected box, resizes to the model's 112x112
/// input, and L2-normalizes the output so downstream Euclidean distances
/// live on the unit hypersphere.
use std::path::Path;

use crate::detection::domain::face_encoder::FaceEncoder;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxFaceEncoder {
    session: ort::session::Session,
}

impl OnnxFaceEncoder {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .commit_from_file(model_path)?;
        Ok(Self { session })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode(
        &mut self,
        frame: &Frame,
        face: &BoundingBox,
    ) -> Result<Embedding, Box<dyn std::error::Error>> {
        let (x1, y1, x2, y2) = face.square_in_frame(frame.width(), frame.height());
        if x2 <= x1 || y2 <= y1 {
            return Err(format!("face box {face:?} lies outside the frame").into());
        }

        let tensor = preprocess(frame, x1, y1, x2, y2);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("cannot get embedding slice")?;

        let mut values = embedding_slice.to_vec();
        l2_normalize(&mut values);
        Ok(Embedding::new(values))
    }
}

/// Nearest-neighbor resize of the crop to 112x112, normalized, NCHW layout.
fn preprocess(frame: &Frame, x1: u32, y1: u32, x2: u32, y2: u32) -> ndarray::Array4<f32> {
    let crop_w = (x2 - x1) as f64;
    let crop_h = (y2 - y1) as f64;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        let src_y = y1 + (((y as f64 + 0.5) * crop_h / INPUT_SIZE as f64) as u32).min(y2 - y1 - 1);
        for x in 0..INPUT_SIZE {
            let src_x =
                x1 + (((x as f64 + 0.5) * crop_w / INPUT_SIZE as f64) as u32).min(x2 - x1 - 1);
            let rgb = frame.pixel(src_x, src_y);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (rgb[c] as f32 - NORM_MEAN) / NORM_STD;
            }
        }
    }

    tensor
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
