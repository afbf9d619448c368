//! Decision engine
//!
//! Applies the distance threshold policy to the best scan candidate and
//! converts the winning distance into a presentation confidence score.

use super::types::{MatchCandidate, VerificationResult};

/// Presentation confidence for a matched distance: `(1 - d) * 100`
/// clamped to [0, 100]. Deterministic and monotonically decreasing in
/// distance; a display score, not a calibrated probability.
pub fn confidence_score(distance: f32) -> f64 {
    ((1.0 - f64::from(distance)) * 100.0).clamp(0.0, 100.0)
}

/// A match is declared only when the globally minimal distance over the
/// snapshot is at or below the threshold.
pub fn decide(best: Option<MatchCandidate>, threshold: f32) -> VerificationResult {
    match best {
        None => VerificationResult::NoGalleryMatch,
        Some(candidate) if candidate.distance > threshold => VerificationResult::NoGalleryMatch,
        Some(candidate) => VerificationResult::Identified {
            identity_id: candidate.identity_id,
            confidence: confidence_score(candidate.distance),
        },
    }
}
