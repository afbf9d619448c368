//! Inference engine module
//!
//! OpenVINO-backed face detection and descriptor embedding. Models are
//! loaded once at process start into an immutable stack shared by
//! reference into every call; no locking is needed for concurrent reads.

pub mod detector;
pub mod embedder;
pub mod extractor;
pub mod model;
pub mod preprocess;

pub use detector::FaceDetector;
pub use embedder::DescriptorEmbedder;
pub use extractor::{DescriptorExtractor, OpenVinoExtractor};
pub use model::ModelStack;
