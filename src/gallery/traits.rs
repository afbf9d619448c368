//! Gallery abstraction
//!
//! The enrolled population is owned by an external store; the pipeline
//! only borrows a read-only snapshot per call. The snapshot is read
//! exactly once at call start and never re-queried mid-call, so
//! concurrent enrollment changes are picked up by the next call.

use async_trait::async_trait;

use crate::error::GalleryError;
use crate::verify::types::IdentityProfile;

/// One enrolled identity as seen by the matcher. Carries either a
/// precomputed descriptor template, a stored photo to re-derive from,
/// or neither (in which case the entry is skipped and counted).
#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub identity_id: String,
    /// Serialized descriptor (little-endian f32), if precomputed.
    pub template: Option<Vec<u8>>,
    /// Raw stored photo bytes.
    pub photo: Option<Vec<u8>>,
}

/// Read access to the enrolled population.
///
/// Implementations must return snapshots in a fixed, reproducible
/// enumeration order; the matcher's tie-break contract depends on it.
#[async_trait]
pub trait GalleryAccessor: Send + Sync + 'static {
    /// The current enrolled population, restricted to entries carrying
    /// a non-empty template or photo.
    async fn snapshot(&self) -> Result<Vec<EnrollmentRecord>, GalleryError>;

    /// Profile fields used to enrich an Identified response.
    async fn profile(&self, identity_id: &str) -> Result<Option<IdentityProfile>, GalleryError>;
}
