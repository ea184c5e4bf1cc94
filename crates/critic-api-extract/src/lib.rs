//! # Critic API Extract
//!
//! The request half of the Critic API: an immutable view of the incoming
//! request and parsers for every framework-reserved query parameter.
//!
//! | Type | Source | Description |
//! |------|--------|-------------|
//! | [`ApiRequest`] | whole request | Method, path, query, headers, collected body |
//! | [`QueryString`] | query string | Multi-valued, order-preserving parameters |
//! | [`Query`] | query string | Lookups scoped to the resource being evaluated |
//! | [`FieldSelection`] | `fields` | Included/excluded dotted paths |
//! | [`Includes`] | `include` | Linked types with per-type options |
//! | [`OutputFormat`] | `output_format` | `default` or `static` envelopes |
//! | [`DebugFlags`] | `debug` | Profiling payload toggles |
//!
//! [`CookieJar`] collects the cookie changes resources request, rendered as
//! `Set-Cookie` headers on the way out.
//!
//! ## Example
//!
//! ```rust
//! use critic_api_extract::{ApiRequest, FieldSelection, Includes};
//! use http::Method;
//!
//! let request = ApiRequest::new(
//!     Method::GET,
//!     "/api/v1/comments?review=7&include=users:limit=2&fields=text,author",
//! )
//! .unwrap();
//!
//! let fields = FieldSelection::parse(request.query().get("fields").unwrap_or("")).unwrap();
//! let includes = Includes::parse(request.query().get_all("include")).unwrap();
//!
//! assert!(fields.included().contains("author"));
//! assert_eq!(includes.get("users").unwrap().limit, Some(2));
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cookie;
mod fields;
mod format;
mod include;
mod query;
mod request;

pub use cookie::{CookieJar, SetCookie};
pub use fields::{FieldDecision, FieldFilter, FieldSelection};
pub use format::{DebugFlags, OutputFormat};
pub use include::{IncludeOptions, Includes};
pub use query::{Query, QueryScope, QueryString};
pub use request::ApiRequest;
