//! # Critic API Checker
//!
//! Converts untyped JSON request bodies into validated, domain-level values.
//!
//! A resource declares the shape of its input as a [`Schema`]; the schema is
//! compiled into a [`TypeChecker`] once and reused across requests. Each
//! value runs through the same pipeline:
//!
//! 1. `check_compatibility` - the primary type gate
//! 2. `check` - extra predicates such as bounds, patterns and membership
//! 3. `convert` - e.g. an id becomes the fetched entity
//! 4. `process` - side effects such as recording a deduced review
//!
//! Failures are [`ApiError::Input`](critic_api_core::ApiError::Input) errors
//! whose message points at the offending leaf (`data.comments[0].text`).
//!
//! ## Object keys
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `name` | required |
//! | `name?` | optional |
//! | `name=null` | optional, converts to null when omitted |
//! | `name!` | processed before unprioritized siblings |

#![doc(html_root_url = "https://docs.rs/critic-api-checker/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod builtin;
mod checker;
mod converted;
mod schema;

pub use builtin::{
    AnyChecker, Attribute, BooleanChecker, EntityChecker, EnumerationChecker, FloatChecker,
    IntegerChecker, ListChecker, ObjectChecker, Presence, StringChecker, VariantChecker,
};
pub use checker::{run, CheckContext, Checker};
pub use converted::Converted;
pub use schema::{Schema, SchemaError, SingleOrMany, TypeChecker};

/// Re-exported so custom checkers need no direct dependency.
pub use async_trait::async_trait;
