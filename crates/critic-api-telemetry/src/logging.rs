//! Subscriber setup for API processes.
//!
//! Every dispatched request runs inside an `api_request` span carrying
//! `request_id`, `method` and `path`; outcome events add `status` and
//! `elapsed_ms`. JSON output keeps the span fields on each line so a log
//! search by `request_id` finds the whole request.
//!
//! # Example
//!
//! ```rust,ignore
//! use critic_api_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! ```

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// How events are written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line, request span fields included.
    #[default]
    Json,
    /// Indented human-readable events.
    Pretty,
}

/// What [`init_logging`] installs.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// When `false`, nothing is installed.
    pub enabled: bool,

    /// `EnvFilter` directive, e.g. `info` or `info,critic_api_server=debug`.
    pub level: String,

    /// Output format.
    pub format: LogFormat,

    /// Adds source file and line to each event.
    pub include_location: bool,

    /// Emits an event when each `api_request` span closes, with its busy
    /// and idle time.
    pub request_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            include_location: false,
            request_spans: false,
        }
    }
}

impl LogConfig {
    /// Pretty output with resolution and expansion steps visible.
    #[must_use]
    pub fn development() -> Self {
        Self {
            enabled: true,
            level: "info,critic_api_server=debug,critic_api_router=debug".to_string(),
            format: LogFormat::Pretty,
            include_location: true,
            request_spans: true,
        }
    }
}

type BoxedLayer = Box<dyn Layer<Layered<EnvFilter, Registry>> + Send + Sync>;

/// Installs the global subscriber.
///
/// # Errors
///
/// [`TelemetryError::InvalidConfig`] for a bad `level` directive,
/// [`TelemetryError::LoggingInit`] when a global subscriber already exists.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }
    let filter = env_filter(&config.level)?;

    let output = tracing_subscriber::fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_span_events(if config.request_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });
    let output: BoxedLayer = match config.format {
        LogFormat::Json => Box::new(output.json().with_current_span(true).with_span_list(false)),
        LogFormat::Pretty => Box::new(output.pretty()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(output)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn env_filter(directive: &str) -> TelemetryResult<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| TelemetryError::InvalidConfig(format!("log level {directive:?}: {e}")))
}
