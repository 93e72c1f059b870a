//! Configuration Loader
//!
//! Layers configuration sources with the `config` crate, later sources winning:
//!
//! 1. Built-in defaults ([`WorkerConfig::default`])
//! 2. TOML file from `OCR_WORKER_CONFIG_PATH`, else `config/ocr-worker.toml` (optional)
//! 3. Environment overlay file next to it, e.g. `config/ocr-worker.production.toml` (optional)
//! 4. Environment variables `OCR_WORKER__<SECTION>__<FIELD>`, e.g. `OCR_WORKER__BROKER__URL`
//!
//! `.env` files are read into the process environment first.

use config::{Config, Environment, File, FileFormat, Map};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::WorkerConfig;
use crate::messaging::providers::rabbitmq::redact_url;

pub const CONFIG_PATH_ENV: &str = "OCR_WORKER_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/ocr-worker.toml";
pub const ENV_PREFIX: &str = "OCR_WORKER";
pub const ENV_SEPARATOR: &str = "__";

/// Builds a validated [`WorkerConfig`] from defaults, files and environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_file: PathBuf,
    environment: String,
    env_source: Option<Map<String, String>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader for the process: file location and environment from env vars
    pub fn new() -> Self {
        let config_file = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self {
            config_file,
            environment: Self::detect_environment(),
            env_source: None,
        }
    }

    /// Read `.env`, then load and validate from the process environment
    pub fn load() -> ConfigResult<WorkerConfig> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::new().load_config()
    }

    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = path.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into().to_lowercase();
        self
    }

    /// Use these variables instead of the process environment
    pub fn with_env_vars(mut self, vars: Map<String, String>) -> Self {
        self.env_source = Some(vars);
        self
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Overlay file for the current environment, `<stem>.<environment>.toml`
    pub fn environment_file(&self) -> PathBuf {
        self.config_file
            .with_extension(format!("{}.toml", self.environment))
    }

    pub fn load_config(&self) -> ConfigResult<WorkerConfig> {
        debug!(
            environment = %self.environment,
            config_file = %self.config_file.display(),
            "Loading OCR worker configuration"
        );

        let defaults =
            Config::try_from(&WorkerConfig::default()).map_err(ConfigurationError::load_error)?;

        let environment_vars = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(self.env_source.clone());

        let merged = Config::builder()
            .add_source(defaults)
            .add_source(
                File::from(self.config_file.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(self.environment_file())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(environment_vars)
            .build()
            .map_err(ConfigurationError::load_error)?;

        let config: WorkerConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialization_error)?;

        config.validate()?;

        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(config)
    }

    /// JSON view of the configuration with credentials masked
    pub fn sanitize_config_for_logging(config: &WorkerConfig) -> serde_json::Value {
        let mut config_json = serde_json::json!(config);

        let sensitive_patterns = ["password", "secret", "access_key", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);

        if let Some(url) = config_json.pointer_mut("/broker/url") {
            *url = serde_json::Value::String(redact_url(&config.broker.url));
        }

        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        *val = match &*val {
                            serde_json::Value::String(s) if s.is_empty() => {
                                serde_json::Value::String("[EMPTY]".to_string())
                            }
                            serde_json::Value::String(s) => {
                                // First and last 2 characters only
                                let masked = if s.chars().count() > 4 {
                                    let chars: Vec<char> = s.chars().collect();
                                    let head: String = chars[..2].iter().collect();
                                    let tail: String = chars[chars.len() - 2..].iter().collect();
                                    format!("{head}***{tail}")
                                } else {
                                    "***".to_string()
                                };
                                serde_json::Value::String(format!("[MASKED: {masked}]"))
                            }
                            _ => serde_json::Value::String("[MASKED]".to_string()),
                        };
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(arr) => {
                for item in arr.iter_mut() {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }

    /// `OCR_WORKER_ENV`, then `APP_ENV`, defaulting to `development`
    fn detect_environment() -> String {
        env::var("OCR_WORKER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}
