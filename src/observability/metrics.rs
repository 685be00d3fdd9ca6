//! Prometheus metrics exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, status
//! - `gateway_request_duration_seconds` (histogram): dispatch latency
//! - `gateway_instance_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! # Design Decisions
//! - Low-overhead updates via the `metrics` macros
//! - Exposition runs on its own address, separate from dispatch traffic

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_dispatch(service: &str, status: u16, start: Instant) {
    let labels = [
        ("service", service.to_string()),
        ("status", status.to_string()),
    ];
    metrics::counter!("gateway_requests_total", &labels).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

/// Record an instance health gauge.
pub fn record_instance_health(instance_id: &str, healthy: bool) {
    let labels = [("instance", instance_id.to_string())];
    metrics::gauge!("gateway_instance_health", &labels).set(if healthy { 1.0 } else { 0.0 });
}

/// Record a circuit breaker state gauge.
pub fn record_circuit_state(service: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    let labels = [("service", service.to_string())];
    metrics::gauge!("gateway_circuit_state", &labels).set(value);
}
