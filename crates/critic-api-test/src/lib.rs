//! # Critic API Test
//!
//! In-memory testing for Critic API deployments.
//!
//! - [`TestClient`] sends `http::Request`s through the same
//!   [`ApiService`](critic_api_server::ApiService) the HTTP server uses, with
//!   no socket involved.
//! - [`TestResponse`] collects the response and offers assertion helpers.
//! - [`fixtures`] is a small review domain (users, repositories, reviews,
//!   comments, changesets) to exercise the framework against.
//!
//! ## Example
//!
//! ```ignore
//! use critic_api_test::fixtures;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_get_user() {
//!     let client = fixtures::client(Some(1));
//!     client
//!         .get("/api/v1/users/42?fields=name,email")
//!         .send()
//!         .await
//!         .assert_status(StatusCode::OK)
//!         .assert_json_eq(&json!({
//!             "users": {"name": "alice", "email": "a@e", "is_partial": true}
//!         }));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
pub mod fixtures;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use response::TestResponse;
