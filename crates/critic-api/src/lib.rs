//! # Critic API
//!
//! **JSON-over-HTTP API framework for the Critic code review system**
//!
//! Hosts describe resources once and the framework provides:
//!
//! - path resolution such as `/api/v1/repositories/critic/reviews/7/comments`
//! - lazy serialization with `fields=` selection and `is_partial` marking
//! - `include=` expansion of linked objects, with per-type limits
//! - type-checked `POST`/`PUT` bodies with deduced context values
//! - a fixed error taxonomy mapped onto HTTP statuses
//! - self-documentation at `GET /api/v1`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use critic_api::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_dotenv()
//!         .with_optional_file("critic-api.toml")?
//!         .with_env()
//!         .load()?;
//!     let registry = Registry::builder("v1").register(Reviews).build()?;
//!
//!     critic_api::serve(&config, registry, SessionProvider::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! HTTP → ApiService → CriticProvider → Api → resolve → finalize → emit/expand
//!                                                                    ↓
//! HTTP ← ApiResponse ←──────────────── error envelope or JSON body ←─┘
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;

pub use bootstrap::{api_options, build_api, serve, StartupError};

// Re-export core types
pub use critic_api_core as core;

// Re-export query parsing and request types
pub use critic_api_extract as extract;

// Re-export input checking
pub use critic_api_checker as checker;

// Re-export resource registration
pub use critic_api_router as router;

// Re-export the dispatcher and HTTP adapter
pub use critic_api_server as server;

// Re-export logging setup and request tracing
pub use critic_api_telemetry as telemetry;

// Re-export configuration
pub use critic_api_config as config;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use critic_api::prelude::*;
/// ```
pub mod prelude {
    pub use critic_api_core::{
        ApiError, ApiResult, Critic, DomainError, Entity, FetchById, JsonNode, RequestId, Value,
        Values,
    };

    pub use critic_api_extract::{ApiRequest, OutputFormat};

    pub use critic_api_checker::{Converted, Schema};

    pub use critic_api_router::{
        async_trait, Context, Operation, Parameters, Registry, Resource, ResourceDescriptor,
    };

    pub use critic_api_server::{Api, ApiOptions, ApiResponse, ApiService, CriticProvider, Server};

    pub use critic_api_config::{ApiConfig, ConfigLoader};

    pub use crate::{build_api, serve, StartupError};
}
