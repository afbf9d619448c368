//! Batch matcher
//!
//! Scans a fixed-order gallery snapshot against a query descriptor in
//! bounded-size concurrent batches and tracks the running minimum
//! distance. Per-entry failures (missing photo, corrupt template, no
//! face in a stored photo) are logged and skipped; they never abort the
//! scan.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future;
use tracing::{debug, warn};

use super::template::{decode_template, DescriptorCache};
use super::types::{FaceDescriptor, MatchCandidate};
use crate::engine::extractor::DescriptorExtractor;
use crate::gallery::EnrollmentRecord;

/// Result of one full scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Minimal-distance entry, or none if the snapshot yielded zero
    /// usable descriptors.
    pub best: Option<MatchCandidate>,
    /// Entries that produced a descriptor and were compared.
    pub compared: usize,
    /// Entries skipped for local reasons (no bytes, corrupt template,
    /// extraction failure).
    pub skipped: usize,
}

pub struct BatchMatcher<E: DescriptorExtractor> {
    extractor: Arc<E>,
    batch_size: usize,
    cache: Option<DescriptorCache>,
}

impl<E: DescriptorExtractor> BatchMatcher<E> {
    pub fn new(extractor: Arc<E>, batch_size: usize) -> Self {
        Self {
            extractor,
            batch_size: batch_size.max(1),
            cache: Some(DescriptorCache::new()),
        }
    }

    /// A matcher that re-derives every photo descriptor on every call,
    /// with no caching at all.
    pub fn without_cache(extractor: Arc<E>, batch_size: usize) -> Self {
        Self {
            extractor,
            batch_size: batch_size.max(1),
            cache: None,
        }
    }

    /// Scan the snapshot in batches. Candidates are folded in snapshot
    /// order with a strict `<`, so on exact distance ties the
    /// first-encountered entry wins regardless of batch size or task
    /// completion order.
    pub async fn scan(&self, query: &FaceDescriptor, snapshot: &[EnrollmentRecord]) -> ScanReport {
        let mut best: Option<MatchCandidate> = None;
        let mut compared = 0usize;
        let mut skipped = 0usize;

        for (batch_idx, batch) in snapshot.chunks(self.batch_size).enumerate() {
            let derivations = batch.iter().map(|entry| self.derive_descriptor(entry));
            // join_all yields results in submission order.
            let results = future::join_all(derivations).await;
            debug!(batch = batch_idx, entries = batch.len(), "batch joined");

            for (entry, derived) in batch.iter().zip(results) {
                let Some(descriptor) = derived else {
                    skipped += 1;
                    continue;
                };
                let distance = query.distance(&descriptor);
                compared += 1;
                if best.as_ref().map_or(true, |b| distance < b.distance) {
                    debug!(identity = %entry.identity_id, distance, "new best candidate");
                    best = Some(MatchCandidate {
                        identity_id: entry.identity_id.clone(),
                        distance,
                    });
                }
            }
        }

        // Cached descriptors for identities gone from the gallery would
        // otherwise accumulate forever.
        if let Some(cache) = &self.cache {
            let live: HashSet<&str> = snapshot.iter().map(|e| e.identity_id.as_str()).collect();
            cache.retain(|id| live.contains(id));
        }

        ScanReport {
            best,
            compared,
            skipped,
        }
    }

    /// Derive one entry's descriptor: stored template first, then the
    /// stored photo, else skip. Returns `None` on any local failure.
    async fn derive_descriptor(&self, entry: &EnrollmentRecord) -> Option<FaceDescriptor> {
        let dim = self.extractor.descriptor_dim();

        if let Some(template) = entry.template.as_deref().filter(|t| !t.is_empty()) {
            return match decode_template(template, dim) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    warn!(identity = %entry.identity_id, "skipping entry: {e}");
                    None
                }
            };
        }

        let Some(photo) = entry.photo.as_ref().filter(|p| !p.is_empty()) else {
            debug!(identity = %entry.identity_id, "entry has no stored template or photo");
            return None;
        };

        if let Some(cache) = &self.cache {
            if let Some(descriptor) = cache.lookup(&entry.identity_id, photo) {
                debug!(identity = %entry.identity_id, "descriptor served from cache");
                return Some(descriptor);
            }
        }

        let extractor = self.extractor.clone();
        let bytes = photo.clone();
        match tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await {
            Ok(Ok(descriptor)) => {
                if let Some(cache) = &self.cache {
                    cache.store(&entry.identity_id, photo, &descriptor);
                }
                Some(descriptor)
            }
            Ok(Err(e)) => {
                warn!(identity = %entry.identity_id, "skipping entry: {e}");
                None
            }
            Err(e) => {
                warn!(identity = %entry.identity_id, "extraction task failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::template::encode_template;
    use crate::verify::testutil::{photo_bytes, MockExtractor};

    fn template_entry(id: &str, values: &[f32]) -> EnrollmentRecord {
        EnrollmentRecord {
            identity_id: id.to_string(),
            template: Some(encode_template(&FaceDescriptor::new(values.to_vec()))),
            photo: None,
        }
    }

    fn photo_entry(id: &str, values: &[f32]) -> EnrollmentRecord {
        EnrollmentRecord {
            identity_id: id.to_string(),
            template: None,
            photo: Some(photo_bytes(values)),
        }
    }

    fn empty_entry(id: &str) -> EnrollmentRecord {
        EnrollmentRecord {
            identity_id: id.to_string(),
            template: None,
            photo: None,
        }
    }

    /// Distances from a zero query to a 1-d entry equal the entry value.
    fn worked_example_snapshot() -> Vec<EnrollmentRecord> {
        vec![
            template_entry("A", &[0.8]),
            template_entry("B", &[0.45]),
            template_entry("C", &[0.61]),
        ]
    }

    #[tokio::test]
    async fn test_empty_snapshot_yields_no_candidate() {
        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 5);
        let query = FaceDescriptor::new(vec![0.0]);

        let report = matcher.scan(&query, &[]).await;
        assert!(report.best.is_none());
        assert_eq!(report.compared, 0);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn test_returns_global_minimum() {
        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 5);
        let query = FaceDescriptor::new(vec![0.0]);

        let report = matcher.scan(&query, &worked_example_snapshot()).await;
        let best = report.best.unwrap();
        assert_eq!(best.identity_id, "B");
        assert!((best.distance - 0.45).abs() < 1e-6);
        assert_eq!(report.compared, 3);
    }

    #[tokio::test]
    async fn test_batch_size_does_not_change_outcome() {
        let snapshot = worked_example_snapshot();
        let query = FaceDescriptor::new(vec![0.0]);

        for batch_size in [1, 5, snapshot.len()] {
            let extractor = Arc::new(MockExtractor::new(1));
            let matcher = BatchMatcher::new(extractor, batch_size);
            let best = matcher.scan(&query, &snapshot).await.best.unwrap();
            assert_eq!(best.identity_id, "B");
            assert!((best.distance - 0.45).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_exact_tie_keeps_first_in_snapshot_order() {
        // Identical template bytes guarantee bit-identical distances.
        let snapshot = vec![
            template_entry("first", &[0.5]),
            template_entry("second", &[0.5]),
        ];
        let query = FaceDescriptor::new(vec![0.0]);

        for batch_size in [1, 2, 5] {
            let extractor = Arc::new(MockExtractor::new(1));
            let matcher = BatchMatcher::new(extractor, batch_size);
            let best = matcher.scan(&query, &snapshot).await.best.unwrap();
            assert_eq!(best.identity_id, "first");
        }
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_skip_equivalent() {
        let query = FaceDescriptor::new(vec![0.0]);

        let mut with_corrupt = worked_example_snapshot();
        with_corrupt.insert(
            1,
            EnrollmentRecord {
                identity_id: "corrupt".to_string(),
                template: Some(vec![0u8; 3]), // wrong byte length
                photo: None,
            },
        );

        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 2);
        let with_report = matcher.scan(&query, &with_corrupt).await;

        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 2);
        let without_report = matcher.scan(&query, &worked_example_snapshot()).await;

        let a = with_report.best.unwrap();
        let b = without_report.best.unwrap();
        assert_eq!(a.identity_id, b.identity_id);
        assert_eq!(a.distance, b.distance);
        assert_eq!(with_report.skipped, 1);
        assert_eq!(without_report.skipped, 0);
    }

    #[tokio::test]
    async fn test_entries_without_bytes_are_counted_not_failed() {
        let snapshot = vec![
            empty_entry("nothing"),
            template_entry("A", &[0.2]),
            EnrollmentRecord {
                identity_id: "blank".to_string(),
                template: Some(Vec::new()),
                photo: Some(Vec::new()),
            },
        ];
        let query = FaceDescriptor::new(vec![0.0]);

        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 5);
        let report = matcher.scan(&query, &snapshot).await;

        assert_eq!(report.best.unwrap().identity_id, "A");
        assert_eq!(report.compared, 1);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn test_photo_entries_go_through_extractor() {
        let snapshot = vec![photo_entry("P", &[0.3]), template_entry("T", &[0.7])];
        let query = FaceDescriptor::new(vec![0.0]);

        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor.clone(), 5);
        let report = matcher.scan(&query, &snapshot).await;

        assert_eq!(report.best.unwrap().identity_id, "P");
        assert_eq!(extractor.extractions(), 1);
    }

    #[tokio::test]
    async fn test_photo_without_face_is_skipped() {
        // Marker payload the mock reports as having no detectable face.
        let snapshot = vec![
            EnrollmentRecord {
                identity_id: "no-face".to_string(),
                template: None,
                photo: Some(MockExtractor::NO_FACE_PHOTO.to_vec()),
            },
            template_entry("A", &[0.4]),
        ];
        let query = FaceDescriptor::new(vec![0.0]);

        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor, 5);
        let report = matcher.scan(&query, &snapshot).await;

        assert_eq!(report.best.unwrap().identity_id, "A");
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_cache_serves_unchanged_photo_and_misses_on_update() {
        let query = FaceDescriptor::new(vec![0.0]);
        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor.clone(), 5);

        let snapshot = vec![photo_entry("P", &[0.3])];
        matcher.scan(&query, &snapshot).await;
        matcher.scan(&query, &snapshot).await;
        assert_eq!(extractor.extractions(), 1);

        // An updated photo must be re-derived on the very next call.
        let updated = vec![photo_entry("P", &[0.2])];
        let report = matcher.scan(&query, &updated).await;
        assert_eq!(extractor.extractions(), 2);
        assert!((report.best.unwrap().distance - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_cache_evicts_identities_removed_from_gallery() {
        let query = FaceDescriptor::new(vec![0.0]);
        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::new(extractor.clone(), 5);

        let snapshot = vec![photo_entry("P", &[0.3])];
        matcher.scan(&query, &snapshot).await;
        assert_eq!(extractor.extractions(), 1);

        // A scan without P drops its cached descriptor; re-enrollment
        // re-derives instead of serving stale values.
        matcher.scan(&query, &[]).await;
        matcher.scan(&query, &snapshot).await;
        assert_eq!(extractor.extractions(), 2);
    }

    #[tokio::test]
    async fn test_without_cache_rederives_every_call() {
        let query = FaceDescriptor::new(vec![0.0]);
        let extractor = Arc::new(MockExtractor::new(1));
        let matcher = BatchMatcher::without_cache(extractor.clone(), 5);

        let snapshot = vec![photo_entry("P", &[0.3])];
        matcher.scan(&query, &snapshot).await;
        matcher.scan(&query, &snapshot).await;
        assert_eq!(extractor.extractions(), 2);
    }
}
