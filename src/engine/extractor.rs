//! Descriptor extraction
//!
//! The black-box seam of the pipeline: raw image bytes in, at most one
//! face descriptor out. The matcher and verification service depend
//! only on the trait; the OpenVINO implementation wires detection and
//! embedding together.

use tracing::debug;

use super::detector::FaceDetector;
use super::embedder::DescriptorEmbedder;
use super::model::ModelStack;
use super::preprocess::{crop_face, decode_image};
use crate::config::VerifyConfig;
use crate::error::ExtractError;
use crate::verify::types::FaceDescriptor;

/// Relative margin added around the detected box before embedding.
const CROP_MARGIN: f32 = 0.2;

/// Derives a descriptor from raw image bytes. Implementations must be
/// side-effect free per call; any model state is loaded once at process
/// start and shared read-only.
pub trait DescriptorExtractor: Send + Sync + 'static {
    /// Dimensionality of produced descriptors.
    fn descriptor_dim(&self) -> usize;

    /// Extract the single best face's descriptor from image bytes.
    fn extract(&self, image_bytes: &[u8]) -> Result<FaceDescriptor, ExtractError>;
}

/// OpenVINO-backed extractor: decode, detect, pick the best face, crop,
/// embed.
pub struct OpenVinoExtractor {
    detector: FaceDetector,
    embedder: DescriptorEmbedder,
}

impl OpenVinoExtractor {
    pub fn new(stack: &ModelStack, config: &VerifyConfig) -> Self {
        let detector = FaceDetector::new(
            stack.detector().clone(),
            config.detector_input_size,
            config.min_detection_confidence,
        );
        let embedder = DescriptorEmbedder::new(stack.embedder().clone(), config.descriptor_dim);

        Self { detector, embedder }
    }
}

impl DescriptorExtractor for OpenVinoExtractor {
    fn descriptor_dim(&self) -> usize {
        self.embedder.descriptor_dim()
    }

    fn extract(&self, image_bytes: &[u8]) -> Result<FaceDescriptor, ExtractError> {
        let image = decode_image(image_bytes).map_err(|e| ExtractError::Decode(e.to_string()))?;

        let best = self
            .detector
            .best_face(&image)
            .map_err(|e| ExtractError::Inference(e.to_string()))?;

        let Some(face) = best else {
            return Err(ExtractError::NoFace);
        };
        debug!(confidence = face.confidence, "best face selected");

        let crop = crop_face(&image, face.x1, face.y1, face.x2, face.y2, CROP_MARGIN);
        self.embedder
            .embed(&crop)
            .map_err(|e| ExtractError::Inference(e.to_string()))
    }
}
