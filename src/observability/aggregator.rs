//! Request metrics aggregation.
//!
//! # Responsibilities
//! - Count every dispatched request's outcome, overall and broken down
//!   per service and per instance
//! - Maintain a running-average latency without storing samples
//! - Produce read-only point-in-time snapshots for the operator API
//!
//! # Design Decisions
//! - Counters are per-key DashMap entries: writers for unrelated
//!   services never contend and snapshots never block writers
//! - Failure rate is derived at snapshot time, never stored

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Final outcome of one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    successes: u64,
    failures: u64,
    avg_latency_ms: f64,
}

impl Counters {
    fn record(&mut self, outcome: Outcome, latency_ms: f64) {
        self.requests += 1;
        match outcome {
            Outcome::Success => self.successes += 1,
            Outcome::Failure => self.failures += 1,
        }
        let n = self.requests as f64;
        self.avg_latency_ms = (self.avg_latency_ms * (n - 1.0) + latency_ms) / n;
    }

    fn view(&self) -> CounterView {
        CounterView {
            total_requests: self.requests,
            success_count: self.successes,
            failure_count: self.failures,
            failure_rate: if self.requests == 0 {
                0.0
            } else {
                self.failures as f64 / self.requests as f64
            },
            avg_response_time_ms: self.avg_latency_ms,
        }
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CounterView {
    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub failure_rate: f64,
    pub avg_response_time_ms: f64,
}

/// Point-in-time copy of all request metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RequestMetricsSnapshot {
    #[serde(flatten)]
    pub totals: CounterView,
    pub services: BTreeMap<String, CounterView>,
    pub instances: BTreeMap<String, CounterView>,
}

/// Process-lifetime request counters.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    totals: Mutex<Counters>,
    services: DashMap<String, Counters>,
    instances: DashMap<String, Counters>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the final outcome and latency of one dispatched request.
    pub fn record(&self, service: &str, instance_id: &str, outcome: Outcome, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        self.lock_totals().record(outcome, latency_ms);
        self.services
            .entry(service.to_string())
            .or_default()
            .record(outcome, latency_ms);
        self.instances
            .entry(instance_id.to_string())
            .or_default()
            .record(outcome, latency_ms);
    }

    /// Record a request rejected before any instance was attempted
    /// (no healthy instance, open breaker). The totals and the service
    /// row count the failure; no instance row exists to charge.
    pub fn record_rejection(&self, service: &str, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        self.lock_totals().record(Outcome::Failure, latency_ms);
        self.services
            .entry(service.to_string())
            .or_default()
            .record(Outcome::Failure, latency_ms);
    }

    /// Read-only point-in-time copy; never blocks writers for long —
    /// each entry is copied under its own short-lived lock.
    pub fn snapshot(&self) -> RequestMetricsSnapshot {
        RequestMetricsSnapshot {
            totals: self.lock_totals().view(),
            services: self
                .services
                .iter()
                .map(|e| (e.key().clone(), e.value().view()))
                .collect(),
            instances: self
                .instances
                .iter()
                .map(|e| (e.key().clone(), e.value().view()))
                .collect(),
        }
    }

    fn lock_totals(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.totals.lock().unwrap_or_else(|e| e.into_inner())
    }
}
