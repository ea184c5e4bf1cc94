//! # Critic API Router
//!
//! Resource registration and the per-request state resources work with.
//!
//! - [`Resource`] - the interface every endpoint implements
//! - [`ResourceDescriptor`] - name, value types, contexts, operations, schemas
//! - [`Registry`] - the frozen path and value-type maps built at startup
//! - [`Parameters`] - per-request parameters, bound context and caches
//! - [`Linked`] - references collected for linked expansion
//!
//! ## Paths
//!
//! A top-level resource `comments` registered for version `v1` is reachable
//! at `v1/comments`. Declaring the context `reviews` also makes it reachable
//! under any `reviews/<argument>` as `.../reviews/comments`:
//!
//! ```rust
//! use critic_api_core::{ApiResult, Entity, JsonNode, Value};
//! use critic_api_router::{async_trait, Context, Parameters, Registry, Resource, ResourceDescriptor};
//!
//! #[derive(Debug)]
//! struct Comment(i64);
//!
//! impl Entity for Comment {
//!     const TYPE_NAME: &'static str = "comment";
//!     fn id(&self) -> i64 { self.0 }
//! }
//!
//! struct Comments(ResourceDescriptor);
//!
//! #[async_trait]
//! impl Resource for Comments {
//!     fn descriptor(&self) -> &ResourceDescriptor { &self.0 }
//!
//!     async fn json(&self, _parameters: &Parameters, value: &Value) -> ApiResult<JsonNode> {
//!         Ok(JsonNode::object([("id", JsonNode::from(value.id()))]))
//!     }
//! }
//!
//! let registry = Registry::builder("v1")
//!     .register(Comments(
//!         ResourceDescriptor::new("comments")
//!             .value_type::<Comment>()
//!             .contexts([Context::TopLevel, Context::parent("reviews")]),
//!     ))
//!     .build()
//!     .unwrap();
//!
//! assert!(registry.handler("v1/comments").is_some());
//! assert!(registry.handler(".../reviews/comments").is_some());
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-router/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod descriptor;
mod linked;
mod parameters;
mod registry;
mod resource;

pub use descriptor::{Context, InputSchemas, Operation, ResourceDescriptor};
pub use linked::Linked;
pub use parameters::{ParameterDefaults, Parameters, SliceScope};
pub use registry::{InputCheckers, Registry, RegistryBuilder, RegistryError, RELATIVE};
pub use resource::Resource;

/// Re-exported so resources need no direct dependency.
pub use async_trait::async_trait;
