//! Configuration types.
//!
//! Every section carries defaults, so a file only needs the fields it
//! changes. Unknown fields are rejected.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use critic_api_extract::OutputFormat;
use critic_api_telemetry::LogConfig;

use crate::ConfigError;

/// Default path prefix the API is mounted under.
pub const DEFAULT_PREFIX: &str = "/api";

/// Default API version segment.
pub const DEFAULT_VERSION: &str = "v1";

/// Default cap on request bodies (16 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Complete Critic API configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to layer a file and
/// environment overrides on top of the defaults.
///
/// # Example
///
/// ```
/// use critic_api_config::ApiConfig;
///
/// let config = ApiConfig::default();
/// assert_eq!(config.api.prefix, "/api");
/// assert_eq!(config.server.http_addr, "127.0.0.1:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ApiConfig {
    /// Request processing settings.
    #[serde(default)]
    pub api: ApiSettings,

    /// Listener settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl ApiConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidSetting`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_setting(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if !self.api.prefix.starts_with('/') {
            return Err(ConfigError::invalid_setting(
                "api.prefix",
                format!("must start with '/': {:?}", self.api.prefix),
            ));
        }

        if self.api.version.is_empty() || self.api.version.contains('/') {
            return Err(ConfigError::invalid_setting(
                "api.version",
                format!("must be a single path segment: {:?}", self.api.version),
            ));
        }

        self.api.output_format()?;

        if self.api.max_body_bytes == 0 {
            return Err(ConfigError::invalid_setting(
                "api.max_body_bytes",
                "must be greater than zero",
            ));
        }

        Ok(())
    }
}

/// The `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiSettings {
    /// Path prefix, e.g. `/api`.
    pub prefix: String,

    /// Version segment served below the prefix.
    pub version: String,

    /// `default` or `static`, used when a request names no `output_format`.
    pub default_output_format: String,

    /// Whether the `debug` query parameter is honoured.
    pub allow_debug: bool,

    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            version: DEFAULT_VERSION.to_string(),
            default_output_format: OutputFormat::Default.as_str().to_string(),
            allow_debug: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl ApiSettings {
    /// The parsed default output format.
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        self.default_output_format.parse().map_err(|_| {
            ConfigError::invalid_setting(
                "api.default_output_format",
                format!(
                    "expected one of {:?}, got {:?}",
                    OutputFormat::CHOICES,
                    self.default_output_format
                ),
            )
        })
    }
}

/// The `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Listen address, e.g. `127.0.0.1:8080`.
    pub http_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable output.
    Pretty,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `critic_api_server=debug,info`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Whether to log file and line.
    pub include_location: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
        }
    }
}

impl LoggingSettings {
    /// The subscriber configuration for these settings.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level.clone(),
            format: match self.format {
                LogFormat::Json => critic_api_telemetry::LogFormat::Json,
                LogFormat::Pretty => critic_api_telemetry::LogFormat::Pretty,
            },
            include_location: self.include_location,
            ..LogConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        config.validate().unwrap();
        assert_eq!(config.api.version, "v1");
        assert!(config.api.allow_debug);
        assert_eq!(config.api.max_body_bytes, 16 * 1024 * 1024);
        assert_eq!(config.api.output_format().unwrap(), OutputFormat::Default);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: ApiConfig = toml::from_str("[api]\nallow_debug = false\n").unwrap();
        assert!(!config.api.allow_debug);
        assert_eq!(config.api.prefix, "/api");
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(toml::from_str::<ApiConfig>("[api]\nprefx = \"/x\"\n").is_err());
        assert!(toml::from_str::<ApiConfig>("[metrics]\nenabled = true\n").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ApiConfig::default();
        config.server.http_addr = "localhost".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSetting { field, .. }) if field == "server.http_addr"
        ));

        let mut config = ApiConfig::default();
        config.api.prefix = "api".to_string();
        assert!(config.validate().is_err());

        for version in ["", "v1/v2"] {
            let mut config = ApiConfig::default();
            config.api.version = version.to_string();
            assert!(config.validate().is_err(), "{version:?} accepted");
        }

        let mut config = ApiConfig::default();
        config.api.default_output_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_config_mapping() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
        };
        let log = settings.log_config();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, critic_api_telemetry::LogFormat::Pretty);
        assert!(log.include_location);
        assert!(log.enabled);
    }
}
