//! Verification pipeline types

use serde::{Deserialize, Serialize};

use crate::utils::math::euclidean_distance;

/// Fixed-length face embedding.
///
/// Descriptors carry no notion of equality, only distance; two captures
/// of the same face never produce identical vectors.
#[derive(Debug, Clone)]
pub struct FaceDescriptor {
    values: Vec<f32>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Euclidean distance to another descriptor.
    pub fn distance(&self, other: &FaceDescriptor) -> f32 {
        euclidean_distance(&self.values, &other.values)
    }
}

/// The best gallery entry seen so far during a scan.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub identity_id: String,
    pub distance: f32,
}

/// Terminal outcome of one verification call.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    /// The minimal distance over the snapshot cleared the threshold.
    /// Confidence is a presentation score in [0, 100], monotonically
    /// decreasing in distance. It is not a calibrated probability.
    Identified { identity_id: String, confidence: f64 },
    /// The query image contained no detectable face.
    NoFaceDetected,
    /// No enrolled descriptor was within the threshold (including an
    /// empty gallery).
    NoGalleryMatch,
    /// Malformed, undecodable or oversized input.
    InputError(String),
}

impl VerificationResult {
    /// Stable kind string for logs and wire responses.
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationResult::Identified { .. } => "identified",
            VerificationResult::NoFaceDetected => "no_face_detected",
            VerificationResult::NoGalleryMatch => "no_gallery_match",
            VerificationResult::InputError(_) => "input_error",
        }
    }
}

/// Profile fields owned by the identity-record collaborator, returned
/// alongside a successful identification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub identity_id: String,
    pub name: String,
    pub emergency_contact: Option<String>,
    pub blood_group: Option<String>,
    pub allergies: Option<String>,
    pub past_surgery: Option<String>,
    pub other_conditions: Option<String>,
}

/// Full result of one verification call.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub result: VerificationResult,
    pub profile: Option<IdentityProfile>,
    pub elapsed_ms: u64,
}
