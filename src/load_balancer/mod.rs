//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → target service identified
//!     → registry (live instance list)
//!     → health.rs (filter to healthy instances)
//!     → affinity.rs (sticky session lookup, if enabled)
//!     → Apply selection algorithm:
//!         - round_robin.rs / weighted.rs (rotation)
//!         - least_conn.rs / least_response.rs (load-aware)
//!         - ip_hash.rs (deterministic by client key)
//!         - random.rs (uniform)
//!     → Return instance or none (caller surfaces 503)
//! ```
//!
//! # Design Decisions
//! - Selection state (counters) is per service; unrelated services never contend
//! - Health records are the source of truth; absent record = assume healthy
//! - Sticky hits bypass the algorithm while the bound instance stays healthy
//! - All unhealthy means no instance, never a fallback to an unhealthy one

pub mod affinity;
pub mod health;
pub mod ip_hash;
pub mod least_conn;
pub mod least_response;
pub mod random;
pub mod round_robin;
pub mod weighted;

pub use health::{HealthEvent, HealthTracker, InstanceHealthRecord, InstanceHealthView};

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Algorithm, BalancerConfig};
use crate::registry::{ServiceInstance, ServiceRegistry};

use affinity::SessionAffinity;

/// Context handed to selection strategies.
pub struct SelectionContext<'a> {
    pub tracker: &'a HealthTracker,
    pub client_key: Option<&'a str>,
}

/// A selection algorithm. Candidates are pre-filtered to healthy
/// instances and never empty.
pub trait SelectionStrategy: Send + Sync + std::fmt::Debug {
    fn pick(
        &self,
        service: &str,
        candidates: &[Arc<ServiceInstance>],
        ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance>;
}

/// Per-request instance selection plus the health/metrics feedback loop.
#[derive(Debug)]
pub struct LoadBalancer {
    registry: Arc<ServiceRegistry>,
    tracker: Arc<HealthTracker>,
    strategy: Box<dyn SelectionStrategy>,
    affinity: Option<SessionAffinity>,
}

impl LoadBalancer {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        tracker: Arc<HealthTracker>,
        config: &BalancerConfig,
    ) -> Self {
        let strategy: Box<dyn SelectionStrategy> = match config.algorithm {
            Algorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            Algorithm::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new()),
            Algorithm::LeastConnections => Box::new(least_conn::LeastConnections::new()),
            Algorithm::LeastResponseTime => Box::new(least_response::LeastResponseTime::new()),
            Algorithm::IpHash => Box::new(ip_hash::IpHash::new()),
            Algorithm::Random => Box::new(random::Random::new()),
        };

        let affinity = config.sticky_sessions.enabled.then(|| {
            SessionAffinity::new(Duration::from_secs(config.sticky_sessions.ttl_secs))
        });

        Self {
            registry,
            tracker,
            strategy,
            affinity,
        }
    }

    /// Pick one healthy instance for a service, or `None` when every
    /// instance is unhealthy or the service is unknown.
    pub fn select_instance(
        &self,
        service: &str,
        client_key: Option<&str>,
    ) -> Option<Arc<ServiceInstance>> {
        let instances = self.registry.instances(service);
        let healthy: Vec<Arc<ServiceInstance>> = instances
            .into_iter()
            .filter(|i| self.tracker.is_healthy(&i.id))
            .collect();

        if healthy.is_empty() {
            tracing::debug!(service = %service, "No healthy instances available");
            return None;
        }

        // A live sticky binding wins over the algorithm outright.
        if let (Some(affinity), Some(key)) = (&self.affinity, client_key) {
            if let Some(bound_id) = affinity.lookup(key) {
                if let Some(instance) = healthy.iter().find(|i| i.id == bound_id) {
                    affinity.bind(key, &instance.id);
                    return Some(instance.clone());
                }
            }
        }

        let ctx = SelectionContext {
            tracker: &self.tracker,
            client_key,
        };
        let selected = self.strategy.pick(service, &healthy, &ctx);

        if let (Some(affinity), Some(key)) = (&self.affinity, client_key) {
            affinity.bind(key, &selected.id);
        }

        Some(selected)
    }

    /// Report a successful request to an instance.
    pub fn record_success(&self, instance: &ServiceInstance, response_time: Duration) {
        self.tracker.record_success(instance, response_time);
    }

    /// Report a failed request attempt against an instance.
    pub fn record_failure(&self, instance: &ServiceInstance, response_time: Duration) {
        self.tracker.record_failure(instance, response_time);
    }

    /// Track an open connection for the duration of the returned guard.
    pub fn track_connection(&self, instance: &Arc<ServiceInstance>) -> ConnectionGuard {
        self.tracker.connection_started(instance);
        ConnectionGuard {
            tracker: self.tracker.clone(),
            instance_id: instance.id.clone(),
        }
    }

    pub fn tracker(&self) -> &Arc<HealthTracker> {
        &self.tracker
    }
}

/// RAII guard decrementing the open-connection counter on drop.
#[derive(Debug)]
pub struct ConnectionGuard {
    tracker: Arc<HealthTracker>,
    instance_id: String,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.tracker.connection_finished(&self.instance_id);
    }
}
