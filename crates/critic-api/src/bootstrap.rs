//! Wiring a loaded configuration to the dispatcher and server.

use std::sync::Arc;

use tracing::info;

use critic_api_config::{ApiConfig, ConfigError};
use critic_api_router::{ParameterDefaults, Registry};
use critic_api_server::{Api, ApiOptions, ApiService, CriticProvider, Server, ServerError};
use critic_api_telemetry::{init_logging, TelemetryError};

/// Errors that prevent the API from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The registry serves a different version than configured.
    #[error("registry serves API version {registry:?} but {configured:?} is configured")]
    VersionMismatch {
        /// Version the registry was built for.
        registry: String,
        /// Version from `api.version`.
        configured: String,
    },

    /// Logging could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// The server failed.
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Dispatcher options for `config`.
pub fn api_options(config: &ApiConfig) -> Result<ApiOptions, StartupError> {
    Ok(ApiOptions {
        prefix: config.api.prefix.clone(),
        defaults: ParameterDefaults {
            output_format: config.api.output_format()?,
            allow_debug: config.api.allow_debug,
        },
        max_body_bytes: config.api.max_body_bytes,
    })
}

/// Builds the dispatcher for `registry` as configured.
///
/// # Example
///
/// ```rust,ignore
/// let api = critic_api::build_api(&ApiConfig::default(), registry)?;
/// ```
pub fn build_api(config: &ApiConfig, registry: Arc<Registry>) -> Result<Api, StartupError> {
    config.validate()?;
    if registry.version() != config.api.version {
        return Err(StartupError::VersionMismatch {
            registry: registry.version().to_string(),
            configured: config.api.version.clone(),
        });
    }
    Ok(Api::with_options(registry, api_options(config)?))
}

/// Initializes logging, then serves the API until SIGINT or SIGTERM.
pub async fn serve(
    config: &ApiConfig,
    registry: Arc<Registry>,
    provider: impl CriticProvider,
) -> Result<(), StartupError> {
    init_logging(&config.logging.log_config())?;
    let api = build_api(config, registry)?;
    info!(
        prefix = %api.options().prefix,
        version = api.registry().version(),
        addr = %config.server.http_addr,
        "starting Critic API"
    );
    Server::new(ApiService::new(api, provider))
        .serve(&config.server.http_addr)
        .await?;
    Ok(())
}
