//! # Critic API Telemetry
//!
//! Observability for the Critic API:
//!
//! - **Logging**: [`init_logging`] installs a `tracing-subscriber` registry
//!   with JSON or pretty output
//! - **Request tracing**: [`RequestTrace`] records timed phases of one request
//!   for the `debug=tracing` payload
//!
//! # Example
//!
//! ```rust
//! use critic_api_telemetry::RequestTrace;
//!
//! let trace = RequestTrace::new();
//! {
//!     let _phase = trace.phase("resolve");
//!     // ... resolve the path ...
//! }
//! assert_eq!(trace.phases()[0].name, "resolve");
//! ```

#![doc(html_root_url = "https://docs.rs/critic-api-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;
mod trace;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use trace::{Phase, PhaseTimer, RequestTrace};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
