//! Error taxonomy
//!
//! Every failure surfaces as one of a small set of machine-checkable
//! kinds; the REST layer maps them onto HTTP status classes.

use thiserror::Error;

/// Failures while deriving a descriptor from raw image bytes.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The payload did not decode to a valid raster image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// No face region cleared the minimum detection confidence.
    #[error("no face detected")]
    NoFace,

    /// The model ran but produced no usable output. Internal, retryable.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A stored template that does not match the expected byte shape.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("corrupt template: expected {expected} bytes, got {actual}")]
    Corrupt { expected: usize, actual: usize },
}

/// Failure to reach the gallery store at all. Fatal to the call;
/// per-entry problems are recovered inside the scan instead.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("gallery unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for GalleryError {
    fn from(e: sqlx::Error) -> Self {
        GalleryError::Unavailable(e.to_string())
    }
}

/// Fatal verification failures. Client-attributable conditions
/// (oversized image, no face) are result variants, not errors.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("gallery unavailable: {0}")]
    Gallery(String),

    #[error("internal error: {0}")]
    Internal(String),
}
