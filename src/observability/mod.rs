//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! translator / engine / runner produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (pretty for terminals, JSON for machines)
//!     → Whatever `metrics` recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - Logs go to stderr so replayed responses own stdout
//! - Metrics are cheap (facade calls are no-ops without a recorder)

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
