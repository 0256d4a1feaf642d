//! Transfer metrics.
//!
//! # Metrics
//! - `http_transfer_requests_total` (counter): finished transfers by method, outcome
//! - `http_transfer_duration_seconds` (histogram): transfer latency by method
//! - `http_transfer_in_flight` (gauge): transfers registered with any runner
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; no exporter is bundled
//! - Outcome labels are fixed strings to keep cardinality bounded
//! - The in-flight gauge is process-wide; runners only move it up and down

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

static ENABLED: AtomicBool = AtomicBool::new(true);

/// Turn metric recording on or off process-wide.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    TransportError,
    AssemblyError,
    Cancelled,
    Abandoned,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::TransportError => "transport_error",
            Outcome::AssemblyError => "assembly_error",
            Outcome::Cancelled => "cancelled",
            Outcome::Abandoned => "abandoned",
        }
    }
}

/// Record one finished transfer.
pub fn record_transfer(method: &str, outcome: Outcome, elapsed: Option<Duration>) {
    if !is_enabled() {
        return;
    }
    metrics::counter!(
        "http_transfer_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
    if let Some(elapsed) = elapsed {
        metrics::histogram!("http_transfer_duration_seconds", "method" => method.to_string())
            .record(elapsed.as_secs_f64());
    }
}

/// A transfer was registered with a runner.
pub fn in_flight_added() {
    if !is_enabled() {
        return;
    }
    metrics::gauge!("http_transfer_in_flight").increment(1.0);
}

/// `count` transfers left a runner.
pub fn in_flight_removed(count: usize) {
    if !is_enabled() || count == 0 {
        return;
    }
    metrics::gauge!("http_transfer_in_flight").decrement(count as f64);
}
