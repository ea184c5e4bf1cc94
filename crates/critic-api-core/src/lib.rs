//! # Critic API Core
//!
//! Core types for the Critic JSON API framework.
//!
//! - [`Value`] / [`Values`] - Type-erased domain objects and "one or many" results
//! - [`JsonNode`] / [`ValueWrapper`] - Lazily resolved JSON trees returned by resources
//! - [`ApiError`] - The error taxonomy with its HTTP status mapping
//! - [`Critic`] - The per-request handle to the domain layer
//! - [`RequestId`] - UUID v7 request identifier

#![doc(html_root_url = "https://docs.rs/critic-api-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod critic;
mod error;
mod node;
mod value;

pub use context::RequestId;
pub use critic::{Critic, FetchById};
pub use error::{
    ApiError, ApiResult, DomainError, ErrorDetail, ErrorEnvelope, ErrorKind, InvalidValues,
};
pub use node::{compare_json, JsonNode, ValueWrapper};
pub use value::{Entity, Value, ValueKey, ValueType, Values};
