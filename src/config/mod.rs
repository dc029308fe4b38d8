//! Configuration module for Formrelay
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and comprehensive validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
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
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
///
/// # Examples
///
/// ```ignore
/// std::env::set_var("MY_VAR", "value");
/// let result = expand_env_vars("prefix-${MY_VAR}-suffix");
/// assert_eq!(result, "prefix-value-suffix");
///
/// let result = expand_env_vars("${MISSING:-default}");
/// assert_eq!(result, "default");
/// ```
fn expand_env_vars(s: &str) -> String {
    // Regex to capture ${VAR} or ${VAR:-default}
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]+))?\}").unwrap();
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let full_match = cap.get(0).unwrap();
        let var_name = cap.get(1).unwrap().as_str();

        // Append the text before the match
        result.push_str(&s[last_match..full_match.start()]);

        // Get value from env, or use default from regex
        let value = match std::env::var(var_name) {
            Ok(val) => val,
            Err(_) => {
                if let Some(default) = cap.get(2) {
                    default.as_str().to_string()
                } else {
                    // No env var and no default. Keep the original placeholder.
                    full_match.as_str().to_string()
                }
            }
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    // Append the rest of the string after the last match
    result.push_str(&s[last_match..]);

    result
}

/// Custom deserializer for strings with environment variable expansion.
///
/// This is used with serde's `deserialize_with` attribute to automatically
/// expand environment variables when deserializing configuration values.
fn deserialize_with_env<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(expand_env_vars(&s))
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

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
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    #[serde(default)]
    pub upload: UploadConfig,
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
        if !is_valid_http_url(&self.remote.endpoint) {
            return Err(ConfigError::ValidationError(
                "Invalid remote endpoint: must start with http:// or https://".into(),
            ));
        }

        if self.remote.api_secret.is_some() && self.remote.api_key.is_none() {
            return Err(ConfigError::ValidationError(
                "remote.api_secret requires remote.api_key to be set".into(),
            ));
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub address: String,
}

/// Remote media host configuration
///
/// Credentials are resolved once at startup; the upload pipeline treats the
/// remote client built from this as an opaque, already-initialized collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the media host API. Supports ${VAR} and ${VAR:-default} expansion.
    #[serde(deserialize_with = "deserialize_with_env")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub api_secret: Option<String>,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum accepted file size in bytes. Submissions over this limit are
    /// rejected with 413 before the whole body is buffered.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
        }
    }
}

fn default_max_file_size() -> u64 {
    33554432 // 32MB
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "127.0.0.1:9090".to_string()
}
