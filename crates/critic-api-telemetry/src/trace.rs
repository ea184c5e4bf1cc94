//! Timed phases of one request.
//!
//! A [`RequestTrace`] is created per request. Each processing step opens a
//! [`PhaseTimer`]; when the timer is finished or dropped, the phase is
//! recorded together with a `tracing` debug event. The collected phases are
//! what `debug=tracing` attaches to a response.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// One recorded phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Phase {
    /// Phase name, e.g. `resolve` or `linked[2]`.
    pub name: String,
    /// Offset from the start of the request, in milliseconds.
    pub start_ms: f64,
    /// Duration, in milliseconds.
    pub duration_ms: f64,
}

/// Timed phases of one request.
#[derive(Debug)]
pub struct RequestTrace {
    started: Instant,
    phases: Mutex<Vec<Phase>>,
}

impl Default for RequestTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTrace {
    /// Starts a trace now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            phases: Mutex::new(Vec::new()),
        }
    }

    /// Time since the trace started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Opens a phase; it is recorded when the timer finishes or drops.
    pub fn phase(&self, name: impl Into<String>) -> PhaseTimer<'_> {
        PhaseTimer {
            trace: self,
            name: Some(name.into()),
            started: Instant::now(),
        }
    }

    /// Records a phase measured elsewhere.
    pub fn record(&self, name: impl Into<String>, started: Instant, duration: Duration) {
        let name = name.into();
        let start_ms = millis(started.saturating_duration_since(self.started));
        let duration_ms = millis(duration);
        debug!(phase = %name, start_ms, duration_ms, "request phase");
        self.phases.lock().push(Phase {
            name,
            start_ms,
            duration_ms,
        });
    }

    /// The phases recorded so far, in completion order.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        self.phases.lock().clone()
    }

    /// The `debug=tracing` payload.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total_ms": millis(self.elapsed()),
            "phases": self.phases(),
        })
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// An open phase.
#[must_use = "a phase is recorded when its timer is dropped"]
#[derive(Debug)]
pub struct PhaseTimer<'a> {
    trace: &'a RequestTrace,
    name: Option<String>,
    started: Instant,
}

impl PhaseTimer<'_> {
    /// Records the phase now.
    pub fn finish(mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        if let Some(name) = self.name.take() {
            self.trace.record(name, self.started, self.started.elapsed());
        }
    }
}

impl Drop for PhaseTimer<'_> {
    fn drop(&mut self) {
        self.complete();
    }
}
