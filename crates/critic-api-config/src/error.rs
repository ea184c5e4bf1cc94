//! Why an [`ApiConfig`](crate::ApiConfig) could not be produced.

use std::path::PathBuf;
use thiserror::Error;

/// A configuration source or setting was rejected.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `with_file` was pointed at a path that does not exist.
    #[error("no configuration file at {path}")]
    MissingFile {
        /// The path given to the loader.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read {path}")]
    Unreadable {
        /// The path given to the loader.
        path: PathBuf,
        /// The I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Neither TOML nor JSON.
    #[error("{source_name} is not TOML or JSON")]
    UnsupportedFormat {
        /// The file path, or the format name passed to `with_string`.
        source_name: String,
    },

    /// Malformed TOML, or TOML naming an unknown section or field.
    #[error("bad TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    /// Malformed JSON, or JSON naming an unknown section or field.
    #[error("bad JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting parsed but cannot be served, such as an `api.prefix`
    /// without a leading slash.
    #[error("{field}: {reason}")]
    InvalidSetting {
        /// Dotted path of the setting, e.g. `server.http_addr`.
        field: String,
        /// What the setting must look like.
        reason: String,
    },

    /// A `CRITIC_API__*` variable names no setting or has a bad value.
    #[error("environment override {var}: {reason}")]
    InvalidOverride {
        /// The variable name, prefix included.
        var: String,
        /// What went wrong.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn missing_file(path: impl Into<PathBuf>) -> Self {
        Self::MissingFile { path: path.into() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unreadable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported_format(source_name: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            source_name: source_name.into(),
        }
    }

    /// A rejected setting at `field`.
    pub fn invalid_setting(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_override(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOverride {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// The dotted setting or variable this error is about, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidSetting { field, .. } => Some(field),
            Self::InvalidOverride { var, .. } => Some(var),
            _ => None,
        }
    }
}
