//! Configuration module for Hayate Uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation. Every section has defaults
//! pointing at a local S3 emulator, so an empty document is a valid config.

use crate::orchestrator::Strategy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// assert_eq!(expand_env_vars("prefix-${MY_VAR}-suffix"), "prefix-value-suffix");
/// assert_eq!(expand_env_vars("${MISSING:-default}"), "default");
/// ```
pub(crate) fn expand_env_vars(s: &str) -> String {
    let re = env_var_pattern();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                // No env var and no default. Keep the original placeholder.
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

fn env_var_pattern() -> &'static regex_lite::Regex {
    static PATTERN: std::sync::OnceLock<regex_lite::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}")
            .expect("static env var pattern is valid")
    })
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Longest validity S3 accepts for a presigned URL
pub const MAX_EXPIRY_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.bucket cannot be empty".into(),
            ));
        }

        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region cannot be empty".into(),
            ));
        }

        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid storage endpoint '{}': must start with http:// or https://",
                    endpoint
                )));
            }
        }

        if self.storage.access_key.is_some() != self.storage.secret_key.is_some() {
            return Err(ConfigError::ValidationError(
                "storage.access_key and storage.secret_key must be set together".into(),
            ));
        }

        if self.signing.expiry_seconds == 0 || self.signing.expiry_seconds > MAX_EXPIRY_SECONDS {
            return Err(ConfigError::ValidationError(format!(
                "Invalid signing.expiry_seconds {}: must be between 1 and {}",
                self.signing.expiry_seconds, MAX_EXPIRY_SECONDS
            )));
        }

        if self.upload.default_content_type.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "upload.default_content_type cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Storage
// ============================================================================

/// S3 backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: default_endpoint(),
            access_key: None,
            secret_key: None,
            force_path_style: default_force_path_style(),
        }
    }
}

fn default_bucket() -> String {
    "test-uploads".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_endpoint() -> Option<String> {
    Some("http://localhost:4566".to_string())
}

fn default_force_path_style() -> bool {
    true
}

/// Presigned URL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Window before the URL is rejected by the backend. Default: 3600
    #[serde(default = "default_expiry_seconds")]
    pub expiry_seconds: u64,
}

impl SigningConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_seconds)
    }
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: default_expiry_seconds(),
        }
    }
}

fn default_expiry_seconds() -> u64 {
    3600 // 1 hour
}

// ============================================================================
// Upload
// ============================================================================

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_content_type")]
    pub default_content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            default_content_type: default_content_type(),
        }
    }
}

fn default_content_type() -> String {
    crate::upload::DEFAULT_CONTENT_TYPE.to_string()
}

// ============================================================================
// Logging & Metrics
// ============================================================================

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset. Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// When false nothing is recorded and `--print-metrics` prints nothing
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
