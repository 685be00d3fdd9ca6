//! Per-instance health records and the passive/active feedback loop.
//!
//! # Responsibilities
//! - Keep exactly one `InstanceHealthRecord` per known instance
//! - Apply the consecutive-failure/success transition rule
//! - Track open connections and running-average response time
//! - Publish health transitions to subscribed observers
//!
//! # Design Decisions
//! - Absent record means "assume healthy" (cold start serves traffic)
//! - Records live in a DashMap: contention is scoped to one instance
//! - Transitions are broadcast on a channel instead of a global event bus

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::registry::{InstanceStatus, ServiceInstance};

/// Rolling health state for one instance.
#[derive(Debug, Clone)]
pub struct InstanceHealthRecord {
    pub instance_id: String,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Latency of the most recent sample (request or probe), in milliseconds.
    pub last_response_time_ms: f64,
    /// Running average over request samples only.
    pub avg_response_time_ms: f64,
    samples: u64,
    open_connections: u32,
    pub last_checked_at: Option<SystemTime>,
}

impl InstanceHealthRecord {
    fn new(instance_id: &str) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_response_time_ms: 0.0,
            avg_response_time_ms: 0.0,
            samples: 0,
            open_connections: 0,
            last_checked_at: None,
        }
    }
}

/// Serializable view of a health record for the operator API.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceHealthView {
    pub instance_id: String,
    pub service: String,
    pub status: InstanceStatus,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub open_connections: u32,
    pub last_response_time_ms: f64,
    pub avg_response_time_ms: f64,
    pub last_checked_at_unix_ms: Option<u64>,
}

/// Emitted whenever an instance crosses a health threshold.
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub instance_id: String,
    pub healthy: bool,
}

/// Shared health state, fed by both the active poller and per-request
/// outcomes, read by the load balancer on every selection.
#[derive(Debug)]
pub struct HealthTracker {
    records: DashMap<String, InstanceHealthRecord>,
    failure_threshold: u32,
    recovery_threshold: u32,
    events: broadcast::Sender<HealthEvent>,
}

impl HealthTracker {
    pub fn new(failure_threshold: u32, recovery_threshold: u32) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            records: DashMap::new(),
            failure_threshold: failure_threshold.max(1),
            recovery_threshold: recovery_threshold.max(1),
            events,
        }
    }

    /// Subscribe to health transition events.
    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.events.subscribe()
    }

    /// Record a successful request to an instance.
    pub fn record_success(&self, instance: &ServiceInstance, response_time: Duration) {
        self.observe(instance, true, response_time, false);
    }

    /// Record a failed request attempt against an instance.
    pub fn record_failure(&self, instance: &ServiceInstance, response_time: Duration) {
        self.observe(instance, false, response_time, false);
    }

    /// Record an out-of-band health probe result. Probes drive the same
    /// transition rule but do not pollute the request latency average.
    pub fn record_probe(&self, instance: &ServiceInstance, healthy: bool, latency: Duration) {
        self.observe(instance, healthy, latency, true);
    }

    fn observe(&self, instance: &ServiceInstance, success: bool, latency: Duration, probe: bool) {
        let sample_ms = latency.as_secs_f64() * 1000.0;
        let mut transitioned: Option<bool> = None;

        {
            let mut record = self
                .records
                .entry(instance.id.clone())
                .or_insert_with(|| InstanceHealthRecord::new(&instance.id));

            record.last_response_time_ms = sample_ms;
            if probe {
                record.last_checked_at = Some(SystemTime::now());
            } else if success {
                record.samples += 1;
                let n = record.samples as f64;
                record.avg_response_time_ms =
                    (record.avg_response_time_ms * (n - 1.0) + sample_ms) / n;
            }

            if success {
                record.consecutive_failures = 0;
                record.consecutive_successes += 1;
                if !record.healthy && record.consecutive_successes >= self.recovery_threshold {
                    record.healthy = true;
                    transitioned = Some(true);
                }
            } else {
                record.consecutive_successes = 0;
                record.consecutive_failures += 1;
                if record.healthy && record.consecutive_failures >= self.failure_threshold {
                    record.healthy = false;
                    transitioned = Some(false);
                }
            }
        }

        // A successful observation settles Unknown into Healthy without
        // waiting for a threshold; failures wait for the transition below.
        if success && transitioned.is_none() && instance.status() == InstanceStatus::Unknown {
            instance.set_status(InstanceStatus::Healthy);
        }

        if let Some(healthy) = transitioned {
            instance.set_status(if healthy {
                InstanceStatus::Healthy
            } else {
                InstanceStatus::Unhealthy
            });
            tracing::info!(
                instance = %instance.id,
                healthy,
                "Instance health transition"
            );
            let _ = self.events.send(HealthEvent {
                instance_id: instance.id.clone(),
                healthy,
            });
        }
    }

    /// Healthy unless a record says otherwise; absent record assumes healthy.
    pub fn is_healthy(&self, instance_id: &str) -> bool {
        self.records
            .get(instance_id)
            .map(|r| r.healthy)
            .unwrap_or(true)
    }

    /// Running-average response time; instances with no samples report 0.
    pub fn avg_response_time_ms(&self, instance_id: &str) -> f64 {
        self.records
            .get(instance_id)
            .map(|r| r.avg_response_time_ms)
            .unwrap_or(0.0)
    }

    /// Current open-connection count.
    pub fn open_connections(&self, instance_id: &str) -> u32 {
        self.records
            .get(instance_id)
            .map(|r| r.open_connections)
            .unwrap_or(0)
    }

    pub fn connection_started(&self, instance: &ServiceInstance) {
        let mut record = self
            .records
            .entry(instance.id.clone())
            .or_insert_with(|| InstanceHealthRecord::new(&instance.id));
        record.open_connections += 1;
    }

    pub fn connection_finished(&self, instance_id: &str) {
        if let Some(mut record) = self.records.get_mut(instance_id) {
            // Floor-clamped: an unmatched finish never goes negative.
            record.open_connections = record.open_connections.saturating_sub(1);
        }
    }

    /// Build operator views for a set of instances, grouped by service.
    pub fn views(&self, instances: &[(String, Arc<ServiceInstance>)]) -> Vec<InstanceHealthView> {
        instances
            .iter()
            .map(|(service, instance)| {
                let record = self.records.get(&instance.id);
                let (record, known) = match record {
                    Some(r) => (r.clone(), true),
                    None => (InstanceHealthRecord::new(&instance.id), false),
                };
                InstanceHealthView {
                    instance_id: instance.id.clone(),
                    service: service.clone(),
                    status: instance.status(),
                    healthy: !known || record.healthy,
                    consecutive_failures: record.consecutive_failures,
                    consecutive_successes: record.consecutive_successes,
                    open_connections: record.open_connections,
                    last_response_time_ms: record.last_response_time_ms,
                    avg_response_time_ms: record.avg_response_time_ms,
                    last_checked_at_unix_ms: record.last_checked_at.and_then(|t| {
                        t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_millis() as u64)
                    }),
                }
            })
            .collect()
    }
}
