//! Template codec and descriptor cache
//!
//! Stored templates are descriptor vectors serialized as little-endian
//! f32. Photo-backed entries are re-derived on every call so an updated
//! enrollment photo is reflected on the very next verification; the
//! cache below only short-circuits extraction when the stored bytes are
//! checksum-identical to what produced the cached descriptor.

use std::collections::HashMap;

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use super::types::FaceDescriptor;
use crate::error::TemplateError;

/// Decode a stored template into a descriptor, validating the byte
/// length against the expected dimensionality.
pub fn decode_template(bytes: &[u8], dim: usize) -> Result<FaceDescriptor, TemplateError> {
    let expected = dim * 4;
    if bytes.len() != expected {
        return Err(TemplateError::Corrupt {
            expected,
            actual: bytes.len(),
        });
    }

    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4 bytes");
            f32::from_le_bytes(arr)
        })
        .collect();

    Ok(FaceDescriptor::new(values))
}

/// Serialize a descriptor into template bytes.
pub fn encode_template(descriptor: &FaceDescriptor) -> Vec<u8> {
    descriptor
        .as_slice()
        .iter()
        .flat_map(|f| f.to_le_bytes())
        .collect()
}

struct CachedDescriptor {
    digest: [u8; 32],
    values: Vec<f32>,
}

/// Cache of photo-derived descriptors keyed by identity id plus a
/// SHA-256 of the photo bytes. A digest mismatch is a miss, so the
/// freshness guarantee of re-derivation is preserved.
pub struct DescriptorCache {
    entries: RwLock<HashMap<String, CachedDescriptor>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn digest(bytes: &[u8]) -> [u8; 32] {
        Sha256::digest(bytes).into()
    }

    pub fn lookup(&self, identity_id: &str, photo: &[u8]) -> Option<FaceDescriptor> {
        let entries = self.entries.read();
        let cached = entries.get(identity_id)?;
        if cached.digest != Self::digest(photo) {
            return None;
        }
        Some(FaceDescriptor::new(cached.values.clone()))
    }

    pub fn store(&self, identity_id: &str, photo: &[u8], descriptor: &FaceDescriptor) {
        let mut entries = self.entries.write();
        entries.insert(
            identity_id.to_string(),
            CachedDescriptor {
                digest: Self::digest(photo),
                values: descriptor.as_slice().to_vec(),
            },
        );
    }

    /// Drop entries whose identity id fails the predicate, bounding the
    /// cache to identities still enrolled.
    pub fn retain<F: Fn(&str) -> bool>(&self, keep: F) {
        self.entries.write().retain(|id, _| keep(id));
    }
}

impl Default for DescriptorCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_roundtrip() {
        let original = FaceDescriptor::new(vec![0.25, -1.5, 3.0]);
        let bytes = encode_template(&original);
        let restored = decode_template(&bytes, 3).unwrap();
        for (a, b) in original.as_slice().iter().zip(restored.as_slice()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let bytes = vec![0u8; 13];
        let err = decode_template(&bytes, 4).unwrap_err();
        match err {
            TemplateError::Corrupt { expected, actual } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 13);
            }
        }
    }

    #[test]
    fn test_cache_hit_requires_identical_bytes() {
        let cache = DescriptorCache::new();
        let descriptor = FaceDescriptor::new(vec![1.0, 2.0]);
        let photo = b"photo-v1".to_vec();

        assert!(cache.lookup("alice", &photo).is_none());
        cache.store("alice", &photo, &descriptor);
        assert!(cache.lookup("alice", &photo).is_some());

        // Updated photo bytes must miss, forcing re-derivation.
        assert!(cache.lookup("alice", b"photo-v2").is_none());
    }

    #[test]
    fn test_retain_evicts_absent_identities() {
        let cache = DescriptorCache::new();
        cache.store("alice", b"p1", &FaceDescriptor::new(vec![1.0]));
        cache.store("bob", b"p2", &FaceDescriptor::new(vec![2.0]));

        cache.retain(|id| id == "alice");
        assert!(cache.lookup("alice", b"p1").is_some());
        assert!(cache.lookup("bob", b"p2").is_none());
    }
}
