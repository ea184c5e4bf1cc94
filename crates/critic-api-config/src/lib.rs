//! # Critic API Config
//!
//! Typed configuration for Critic API deployments, layered from defaults,
//! a TOML or JSON file, and `CRITIC_API__SECTION__FIELD` environment
//! variables.
//!
//! ```toml
//! [api]
//! prefix = "/api"
//! version = "v1"
//! default_output_format = "default"
//! allow_debug = true
//!
//! [server]
//! http_addr = "127.0.0.1:8080"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    ApiConfig, ApiSettings, LogFormat, LoggingSettings, ServerSettings, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_PREFIX, DEFAULT_VERSION,
};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
