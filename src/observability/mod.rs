//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatched request:
//!     → aggregator.rs (process-lifetime counters, operator snapshots)
//!     → metrics.rs (Prometheus exposition)
//!
//! Health poller / breaker transitions:
//!     → metrics.rs (health and circuit gauges)
//!
//! Startup:
//!     → logging.rs (tracing subscriber, env-filter)
//! ```
//!
//! # Design Decisions
//! - The aggregator is the queryable source for the operator API; the
//!   Prometheus exporter is exposition-only
//! - Metric updates are atomic or per-key locked, never a global lock

pub mod aggregator;
pub mod logging;
pub mod metrics;

pub use aggregator::{MetricsAggregator, Outcome, RequestMetricsSnapshot};
