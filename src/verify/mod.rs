//! Verification pipeline module

pub mod decision;
pub mod matcher;
pub mod service;
pub mod template;
pub mod types;

pub use matcher::BatchMatcher;
pub use service::VerificationService;
pub use types::{
    FaceDescriptor, IdentityProfile, MatchCandidate, VerificationOutcome, VerificationResult,
};

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared test doubles for the matcher and service tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::types::{FaceDescriptor, IdentityProfile};
    use crate::engine::extractor::DescriptorExtractor;
    use crate::error::{ExtractError, GalleryError};
    use crate::gallery::{EnrollmentRecord, GalleryAccessor};

    /// Encode descriptor values as a fake photo payload the mock
    /// extractor can read back.
    pub(crate) fn photo_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Extractor double: interprets the payload as little-endian f32
    /// descriptor values and counts extractions.
    pub(crate) struct MockExtractor {
        dim: usize,
        calls: AtomicUsize,
    }

    impl MockExtractor {
        /// Marker payload standing in for a photo with no detectable
        /// face.
        pub(crate) const NO_FACE_PHOTO: &'static [u8] = &[0xFF];

        pub(crate) fn new(dim: usize) -> Self {
            Self {
                dim,
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn extractions(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DescriptorExtractor for MockExtractor {
        fn descriptor_dim(&self) -> usize {
            self.dim
        }

        fn extract(&self, image_bytes: &[u8]) -> Result<FaceDescriptor, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if image_bytes == Self::NO_FACE_PHOTO {
                return Err(ExtractError::NoFace);
            }
            if image_bytes.is_empty() || image_bytes.len() % 4 != 0 {
                return Err(ExtractError::Decode(
                    "unrecognized image payload".to_string(),
                ));
            }

            let values: Vec<f32> = image_bytes
                .chunks_exact(4)
                .map(|chunk| {
                    let arr: [u8; 4] = chunk.try_into().unwrap();
                    f32::from_le_bytes(arr)
                })
                .collect();

            if values.len() != self.dim {
                return Err(ExtractError::Decode(format!(
                    "payload decodes to {} values, expected {}",
                    values.len(),
                    self.dim
                )));
            }

            Ok(FaceDescriptor::new(values))
        }
    }

    /// Gallery double with a snapshot-read counter.
    pub(crate) struct MockGallery {
        records: Vec<EnrollmentRecord>,
        profiles: HashMap<String, IdentityProfile>,
        pub(crate) snapshots: AtomicUsize,
        fail: bool,
    }

    impl MockGallery {
        pub(crate) fn new(records: Vec<EnrollmentRecord>) -> Self {
            Self {
                records,
                profiles: HashMap::new(),
                snapshots: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub(crate) fn failing() -> Self {
            let mut gallery = Self::new(Vec::new());
            gallery.fail = true;
            gallery
        }

        pub(crate) fn with_profile(mut self, profile: IdentityProfile) -> Self {
            self.profiles.insert(profile.identity_id.clone(), profile);
            self
        }
    }

    #[async_trait]
    impl GalleryAccessor for MockGallery {
        async fn snapshot(&self) -> Result<Vec<EnrollmentRecord>, GalleryError> {
            if self.fail {
                return Err(GalleryError::Unavailable("connection refused".to_string()));
            }
            self.snapshots.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }

        async fn profile(
            &self,
            identity_id: &str,
        ) -> Result<Option<IdentityProfile>, GalleryError> {
            if self.fail {
                return Err(GalleryError::Unavailable("connection refused".to_string()));
            }
            Ok(self.profiles.get(identity_id).cloned())
        }
    }
}
