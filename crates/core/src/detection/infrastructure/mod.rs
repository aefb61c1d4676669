pub mod onnx_face_detector;
pub mod onnx_face_encoder;
