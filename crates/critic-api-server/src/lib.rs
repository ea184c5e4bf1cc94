//! # Critic API Server
//!
//! Request processing for the Critic API:
//!
//! - path resolution against a [`Registry`](critic_api_router::Registry)
//! - serialization of resource JSON trees with field selection
//! - linked expansion of referenced objects
//! - `GET`/`POST`/`PUT`/`DELETE` finalizers
//! - the [`Api`] dispatcher and a hyper HTTP/1 adapter
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use critic_api_extract::ApiRequest;
//! use critic_api_server::{Api, ApiService, Server};
//!
//! let api = Api::new(registry);
//! let provider = move |_: &ApiRequest| -> ApiResult<Arc<dyn Critic>> { Ok(Arc::clone(&critic)) };
//! Server::new(ApiService::new(api, provider))
//!     .serve("127.0.0.1:8080")
//!     .await?;
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod api;
mod emit;
mod evaluator;
mod expand;
mod finalize;
mod resolver;
mod response;
mod server;
mod shutdown;

#[cfg(test)]
mod testing;

pub use api::{Api, ApiOptions, DEFAULT_MAX_BODY_BYTES};
pub use response::{ApiResponse, HttpResponse, ResponseBody, REQUEST_ID_HEADER};
pub use server::{bind, ApiService, CriticProvider, Server, ServerError, DEFAULT_SHUTDOWN_TIMEOUT};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
