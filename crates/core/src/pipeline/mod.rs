pub mod enroll_faces_use_case;
pub mod frame_sampler;
pub mod inspect_faces_use_case;
pub mod pipeline_logger;
pub mod recognize_faces_use_case;
