//! facesort-core — Face detection and recognition engine.
//!
//! Uses SCRFD for face detection and ArcFace for face encoding, both running
//! via ONNX Runtime. The [`FaceEncoder`] trait is the seam callers program
//! against; [`FacePipeline`] is the model-backed implementation.

pub mod alignment;
pub mod detector;
pub mod pipeline;
pub mod recognizer;
pub mod session;
pub mod types;

pub use detector::FaceDetector;
pub use pipeline::{default_model_dir, load_image, FaceEncoder, FacePipeline, PipelineError};
pub use recognizer::FaceRecognizer;
pub use session::InferenceOptions;
pub use types::{BoundingBox, Embedding, EuclideanMatcher, MatchResult, Matcher};
