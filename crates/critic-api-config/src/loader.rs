//! Layered configuration loading.
//!
//! Layers apply in call order: defaults, then each file or string, then
//! environment overrides when [`ConfigLoader::load`] runs.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ApiConfig, ConfigError, LogFormat};

/// Environment prefix used by [`ConfigLoader::with_env`].
pub const DEFAULT_ENV_PREFIX: &str = "CRITIC_API";

/// Builder that assembles an [`ApiConfig`].
///
/// # Example
///
/// ```no_run
/// use critic_api_config::ConfigLoader;
///
/// # fn main() -> Result<(), critic_api_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_optional_file("critic-api.toml")?
///     .with_env()
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: ApiConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Starts from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a `.toml` or `.json` file, chosen by extension.
    ///
    /// Fields the file leaves out take their defaults.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::missing_file(path));
        }
        let content =
            fs::read_to_string(path).map_err(|source| ConfigError::unreadable(path, source))?;
        self.config = Self::parse_file(&content, path)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in `format` (`toml` or `json`).
    ///
    /// # Example
    ///
    /// ```
    /// use critic_api_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string("[server]\nhttp_addr = \"127.0.0.1:3000\"\n", "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    /// assert_eq!(config.server.http_addr, "127.0.0.1:3000");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::unsupported_format(format))
            }
        };
        Ok(self)
    }

    /// Applies `PREFIX__SECTION__FIELD` environment variables on load.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Applies `CRITIC_API__SECTION__FIELD` environment variables on load.
    #[must_use]
    pub fn with_env(self) -> Self {
        self.with_env_prefix(DEFAULT_ENV_PREFIX)
    }

    /// Loads a `.env` file into the process environment, if there is one.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // A missing .env file is not an error.
        let _ = dotenvy::dotenv();
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(mut self) -> Result<ApiConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_vars(&prefix, env::vars())?;
        }
        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ApiConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<ApiConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::unsupported_format(path.display().to_string())),
        }
    }

    fn apply_env_vars<I>(&mut self, prefix: &str, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(rest) = key.strip_prefix(&marker) {
                let path: Vec<&str> = rest.split("__").collect();
                self.apply_env_var(&key, &path, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, path: &[&str], value: &str) -> Result<(), ConfigError> {
        let config = &mut self.config;
        match path {
            ["API", "PREFIX"] => config.api.prefix = value.to_string(),
            ["API", "VERSION"] => config.api.version = value.to_string(),
            ["API", "DEFAULT_OUTPUT_FORMAT"] => {
                config.api.default_output_format = value.to_lowercase();
            }
            ["API", "ALLOW_DEBUG"] => {
                config.api.allow_debug = parse_bool(value)
                    .ok_or_else(|| ConfigError::invalid_override(key, "expected boolean"))?;
            }
            ["API", "MAX_BODY_BYTES"] => {
                config.api.max_body_bytes = value
                    .parse()
                    .map_err(|_| ConfigError::invalid_override(key, "expected integer"))?;
            }
            ["SERVER", "HTTP_ADDR"] => config.server.http_addr = value.to_string(),
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::invalid_override(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["LOGGING", "INCLUDE_LOCATION"] => {
                config.logging.include_location = parse_bool(value)
                    .ok_or_else(|| ConfigError::invalid_override(key, "expected boolean"))?;
            }
            _ => return Err(ConfigError::invalid_override(key, "unknown configuration key")),
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
