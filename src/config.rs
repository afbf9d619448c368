//! Face verification service configuration

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub models: ModelsConfig,
    pub verify: VerifyConfig,
    pub gallery: GalleryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Per-request deadline; in-flight batches are abandoned when it fires.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    pub detector: PathBuf,
    pub embedder: PathBuf,
    pub device: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    /// Images above this size are rejected before any decode is attempted.
    pub max_image_bytes: usize,
    /// Gallery entries processed concurrently per batch.
    pub batch_size: usize,
    /// Minimum detection score for a face region to count at all.
    pub min_detection_confidence: f32,
    /// Maximum Euclidean distance at which a match is still declared.
    pub match_threshold: f32,
    /// Working resolution of the detector (square).
    pub detector_input_size: u32,
    pub descriptor_dim: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GalleryConfig {
    pub sqlite_path: PathBuf,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn default_path() -> &'static str {
        "config.toml"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 3000,
                request_timeout_secs: 120,
            },
            models: ModelsConfig {
                detector: PathBuf::from("models/face_detector.onnx"),
                embedder: PathBuf::from("models/face_embedder.onnx"),
                device: "CPU".to_string(),
            },
            verify: VerifyConfig {
                max_image_bytes: 10 * 1024 * 1024,
                batch_size: 5,
                min_detection_confidence: 0.3,
                match_threshold: 0.6,
                detector_input_size: 416,
                descriptor_dim: 128,
            },
            gallery: GalleryConfig {
                sqlite_path: PathBuf::from("data/gallery.db"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = Config::default();
        assert_eq!(config.verify.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(config.verify.batch_size, 5);
        assert!((config.verify.min_detection_confidence - 0.3).abs() < 1e-6);
        assert!((config.verify.match_threshold - 0.6).abs() < 1e-6);
        assert_eq!(config.verify.detector_input_size, 416);
        assert_eq!(config.verify.descriptor_dim, 128);
    }

    #[test]
    fn test_parse_overrides() {
        let toml_str = r#"
            [server]
            port = 8080
            request_timeout_secs = 30

            [models]
            detector = "det.onnx"
            embedder = "emb.onnx"
            device = "GPU"

            [verify]
            max_image_bytes = 1048576
            batch_size = 10
            min_detection_confidence = 0.5
            match_threshold = 0.4
            detector_input_size = 640
            descriptor_dim = 512

            [gallery]
            sqlite_path = "test.db"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.verify.batch_size, 10);
        assert!((config.verify.match_threshold - 0.4).abs() < 1e-6);
    }
}
