//! # OCR Worker Configuration
//!
//! Typed configuration for the broker, object store, OCR stage and worker loop.
//! Every field has a default matching the standard deployment, so an empty
//! configuration file (or no file at all) yields a runnable worker.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ocr_worker::config::ConfigLoader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigLoader::load()?;
//! let policy = config.broker.retry_policy();
//! let bucket = &config.object_store.bucket;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{broker, ocr, queues, storage};
use crate::messaging::AckMode;
use crate::resilience::RetryPolicy;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub broker: BrokerConfig,
    pub object_store: ObjectStoreConfig,
    pub ocr: OcrConfig,
    pub worker: WorkerLoopConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub url: String,
    pub document_queue: String,
    pub result_queue: String,
    /// Connection attempts at startup, including the first one
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: broker::DEFAULT_URL.to_string(),
            document_queue: queues::DOCUMENT_QUEUE.to_string(),
            result_queue: queues::OCR_RESULT_QUEUE.to_string(),
            max_attempts: broker::DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: broker::DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl BrokerConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// Appended to every object key before fetching, e.g. `.pdf`
    pub key_suffix: Option<String>,
    /// Directory for downloaded documents; system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: storage::DEFAULT_ENDPOINT.to_string(),
            region: storage::DEFAULT_REGION.to_string(),
            access_key: storage::DEFAULT_ACCESS_KEY.to_string(),
            secret_key: storage::DEFAULT_SECRET_KEY.to_string(),
            bucket: storage::DEFAULT_BUCKET.to_string(),
            key_suffix: None,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub dpi: u32,
    pub language: String,
    pub tesseract_program: String,
    pub magick_program: String,
    /// Per subprocess invocation; unbounded when unset
    pub process_timeout_secs: Option<u64>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            dpi: ocr::DEFAULT_DPI,
            language: ocr::DEFAULT_LANGUAGE.to_string(),
            tesseract_program: ocr::DEFAULT_TESSERACT_PROGRAM.to_string(),
            magick_program: ocr::DEFAULT_MAGICK_PROGRAM.to_string(),
            process_timeout_secs: None,
        }
    }
}

impl OcrConfig {
    pub fn process_timeout(&self) -> Option<Duration> {
        self.process_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerLoopConfig {
    pub ack_mode: AckMode,
}

impl WorkerConfig {
    /// Reject configurations the worker cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.broker.url.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field("url", "broker"));
        }
        if self.broker.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "broker.max_attempts",
                "0",
                "at least one connection attempt is required",
            ));
        }
        for (field, value) in [
            ("broker.document_queue", &self.broker.document_queue),
            ("broker.result_queue", &self.broker.result_queue),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.as_str(),
                    "queue name must not be empty",
                ));
            }
        }
        if self.broker.document_queue == self.broker.result_queue {
            return Err(ConfigurationError::validation_error(format!(
                "document_queue and result_queue must differ, both are '{}'",
                self.broker.document_queue
            )));
        }

        if self.object_store.bucket.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "bucket",
                "object_store",
            ));
        }
        if self.object_store.endpoint.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "endpoint",
                "object_store",
            ));
        }

        if self.ocr.dpi == 0 {
            return Err(ConfigurationError::invalid_value(
                "ocr.dpi",
                "0",
                "must be greater than zero",
            ));
        }
        for (field, value) in [
            ("ocr.language", &self.ocr.language),
            ("ocr.tesseract_program", &self.ocr.tesseract_program),
            ("ocr.magick_program", &self.ocr.magick_program),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.as_str(),
                    "must not be empty",
                ));
            }
        }
        if self.ocr.process_timeout_secs == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "ocr.process_timeout_secs",
                "0",
                "omit the field for no timeout",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployment() {
        let config = WorkerConfig::default();

        assert_eq!(config.broker.document_queue, "document_queue");
        assert_eq!(config.broker.result_queue, "ocr_result_queue");
        assert_eq!(config.broker.max_attempts, 5);
        assert_eq!(config.broker.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.object_store.bucket, "documents");
        assert_eq!(config.object_store.key_suffix, None);
        assert_eq!(config.ocr.dpi, 300);
        assert_eq!(config.ocr.language, "eng");
        assert_eq!(config.ocr.process_timeout(), None);
        assert_eq!(config.worker.ack_mode, AckMode::Auto);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_broker_config() {
        let broker = BrokerConfig {
            max_attempts: 3,
            retry_delay_ms: 250,
            ..BrokerConfig::default()
        };
        let policy = broker.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_validation_rejects_unusable_values() {
        let mut config = WorkerConfig::default();
        config.broker.max_attempts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidValue { .. })
        ));

        let mut config = WorkerConfig::default();
        config.broker.result_queue = config.broker.document_queue.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::ValidationError { .. })
        ));

        let mut config = WorkerConfig::default();
        config.object_store.bucket = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::MissingRequiredField { .. })
        ));

        let mut config = WorkerConfig::default();
        config.ocr.dpi = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ocr.dpi"));

        let mut config = WorkerConfig::default();
        config.ocr.language = String::new();
        assert!(config.validate().is_err());
    }
}
