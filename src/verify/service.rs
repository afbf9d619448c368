//! Verification service
//!
//! Root orchestration of one verification call:
//! validate input -> extract query descriptor -> fetch gallery snapshot
//! -> batched scan -> decision -> profile enrichment. Stateless per
//! call; the loaded models are the only cross-call shared resource.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::decision::decide;
use super::matcher::BatchMatcher;
use super::types::{VerificationOutcome, VerificationResult};
use crate::config::VerifyConfig;
use crate::engine::extractor::DescriptorExtractor;
use crate::error::{ExtractError, VerifyError};
use crate::gallery::GalleryAccessor;

pub struct VerificationService<E: DescriptorExtractor, G: GalleryAccessor> {
    extractor: Arc<E>,
    gallery: Arc<G>,
    matcher: BatchMatcher<E>,
    max_image_bytes: usize,
    match_threshold: f32,
}

impl<E: DescriptorExtractor, G: GalleryAccessor> VerificationService<E, G> {
    pub fn new(extractor: Arc<E>, gallery: Arc<G>, config: &VerifyConfig) -> Self {
        let matcher = BatchMatcher::new(extractor.clone(), config.batch_size);
        Self {
            extractor,
            gallery,
            matcher,
            max_image_bytes: config.max_image_bytes,
            match_threshold: config.match_threshold,
        }
    }

    /// Like [`new`](Self::new), but photo descriptors are re-derived on
    /// every call with no caching.
    pub fn without_cache(extractor: Arc<E>, gallery: Arc<G>, config: &VerifyConfig) -> Self {
        let matcher = BatchMatcher::without_cache(extractor.clone(), config.batch_size);
        Self {
            extractor,
            gallery,
            matcher,
            max_image_bytes: config.max_image_bytes,
            match_threshold: config.match_threshold,
        }
    }

    /// Run one verification call end to end.
    ///
    /// Client-attributable conditions come back as result variants;
    /// `Err` is reserved for gallery-fetch and internal failures.
    pub async fn verify(&self, image: &[u8]) -> Result<VerificationOutcome, VerifyError> {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        info!(%request_id, bytes = image.len(), "verification requested");

        // Size cap applies before any decode is attempted.
        if image.is_empty() {
            return Ok(finish(
                VerificationResult::InputError("empty image payload".to_string()),
                started,
            ));
        }
        if image.len() > self.max_image_bytes {
            info!(%request_id, "image rejected: exceeds size cap");
            return Ok(finish(
                VerificationResult::InputError(format!(
                    "image exceeds maximum size of {} bytes",
                    self.max_image_bytes
                )),
                started,
            ));
        }

        let extractor = self.extractor.clone();
        let bytes = image.to_vec();
        let query = match tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await {
            Ok(Ok(descriptor)) => descriptor,
            Ok(Err(ExtractError::NoFace)) => {
                // Short-circuit: the gallery is never fetched.
                info!(%request_id, "no face detected in query image");
                return Ok(finish(VerificationResult::NoFaceDetected, started));
            }
            Ok(Err(ExtractError::Decode(reason))) => {
                info!(%request_id, "query image rejected: {reason}");
                return Ok(finish(VerificationResult::InputError(reason), started));
            }
            Ok(Err(e @ ExtractError::Inference(_))) => {
                return Err(VerifyError::Internal(e.to_string()));
            }
            Err(e) => return Err(VerifyError::Internal(e.to_string())),
        };

        // Snapshot is read exactly once and fixed for this call.
        let snapshot = self
            .gallery
            .snapshot()
            .await
            .map_err(|e| VerifyError::Gallery(e.to_string()))?;
        info!(%request_id, entries = snapshot.len(), "gallery snapshot loaded");

        let report = self.matcher.scan(&query, &snapshot).await;
        debug!(
            %request_id,
            compared = report.compared,
            skipped = report.skipped,
            "scan complete"
        );

        let result = decide(report.best, self.match_threshold);

        let profile = match &result {
            VerificationResult::Identified { identity_id, .. } => {
                match self.gallery.profile(identity_id).await {
                    Ok(profile) => profile,
                    Err(e) => {
                        warn!(%request_id, "profile enrichment failed: {e}");
                        None
                    }
                }
            }
            _ => None,
        };

        let outcome = finish(result, started);
        info!(
            %request_id,
            result = outcome.result.kind(),
            elapsed_ms = outcome.elapsed_ms,
            "verification finished"
        );
        Ok(VerificationOutcome { profile, ..outcome })
    }
}

fn finish(result: VerificationResult, started: Instant) -> VerificationOutcome {
    VerificationOutcome {
        result,
        profile: None,
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}
