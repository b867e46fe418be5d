use facegate_core::{MatchPolicy, MultiFacePolicy, DEFAULT_MATCH_THRESHOLD};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("FACEGATE_MATCH_THRESHOLD must be a finite number > 0, got {0}")]
    Threshold(f32),
    #[error("FACEGATE_DESCRIPTOR_DIM must be > 0")]
    DescriptorDim,
    #[error("FACEGATE_MAX_UPLOAD_BYTES must be > 0")]
    UploadLimit,
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address (default: 0.0.0.0).
    pub host: String,
    /// Bind port (default: 5005).
    pub port: u16,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// SCRFD detector file name inside `model_dir`.
    pub detector_model: String,
    /// Recognition model file name inside `model_dir`.
    pub recognizer_model: String,
    /// Path to the SQLite profile database.
    pub db_path: PathBuf,
    /// Length of descriptors produced by the recognizer and stored per profile.
    pub descriptor_dim: usize,
    /// Euclidean distance below which a candidate is accepted.
    pub match_threshold: f32,
    /// How long a match request waits for the profile store.
    pub store_ready_timeout_secs: u64,
    /// Delay between background store connection attempts.
    pub store_retry_ms: u64,
    /// Transport-level request timeout.
    pub request_timeout_secs: u64,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    /// Fail extraction on multi-face photos instead of using the largest face.
    pub reject_multiple_faces: bool,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facegate");

        Self {
            host: std::env::var("FACEGATE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("FACEGATE_PORT", 5005),
            model_dir: std::env::var("FACEGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("models")),
            detector_model: std::env::var("FACEGATE_DETECTOR_MODEL")
                .unwrap_or_else(|_| "det_10g.onnx".to_string()),
            recognizer_model: std::env::var("FACEGATE_RECOGNIZER_MODEL")
                .unwrap_or_else(|_| "face_recognition.onnx".to_string()),
            db_path: std::env::var("FACEGATE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("profiles.db")),
            descriptor_dim: env_parse("FACEGATE_DESCRIPTOR_DIM", 128),
            match_threshold: env_parse("FACEGATE_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD),
            store_ready_timeout_secs: env_parse("FACEGATE_STORE_READY_TIMEOUT_SECS", 25),
            store_retry_ms: env_parse("FACEGATE_STORE_RETRY_MS", 1000),
            request_timeout_secs: env_parse("FACEGATE_REQUEST_TIMEOUT_SECS", 60),
            max_upload_bytes: env_parse("FACEGATE_MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
            reject_multiple_faces: std::env::var("FACEGATE_REJECT_MULTIPLE_FACES")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || self.match_threshold <= 0.0 {
            return Err(ConfigError::Threshold(self.match_threshold));
        }
        if self.descriptor_dim == 0 {
            return Err(ConfigError::DescriptorDim);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::UploadLimit);
        }
        Ok(())
    }

    pub fn detector_path(&self) -> PathBuf {
        self.model_dir.join(&self.detector_model)
    }

    pub fn recognizer_path(&self) -> PathBuf {
        self.model_dir.join(&self.recognizer_model)
    }

    pub fn match_policy(&self) -> MatchPolicy {
        MatchPolicy::new(self.match_threshold)
    }

    pub fn multi_face_policy(&self) -> MultiFacePolicy {
        if self.reject_multiple_faces {
            MultiFacePolicy::Reject
        } else {
            MultiFacePolicy::Largest
        }
    }

    pub fn store_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.store_ready_timeout_secs)
    }

    pub fn store_retry_interval(&self) -> Duration {
        Duration::from_millis(self.store_retry_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Only an explicit affirmative enables a flag.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
