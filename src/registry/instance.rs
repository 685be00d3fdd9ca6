//! Service and instance definitions.
//!
//! # Responsibilities
//! - Represent a backend service (name, health path, retry policy)
//! - Represent a single reachable instance of a service
//! - Track instance status (Unknown/Healthy/Unhealthy)

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use serde::Serialize;
use url::Url;

/// Instance status enum.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for InstanceStatus {
    fn from(val: u8) -> Self {
        match val {
            1 => InstanceStatus::Healthy,
            2 => InstanceStatus::Unhealthy,
            _ => InstanceStatus::Unknown,
        }
    }
}

/// Retry policy for forwarding to a service.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay: Duration,
    /// Cap on the backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// A backend service definition. Immutable during normal operation;
/// replaced wholesale on re-registration.
#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Unique service name.
    pub name: String,
    /// Path probed by the active health checker.
    pub health_check_path: String,
    /// Base request deadline; routes may override.
    pub base_timeout: Option<Duration>,
    /// Retry policy for forwarded requests.
    pub retry_policy: RetryPolicy,
}

/// A single backend instance.
#[derive(Debug)]
pub struct ServiceInstance {
    /// Stable identifier, unique across the registry.
    pub id: String,
    /// Base URL of the instance.
    pub url: Url,
    /// Weight for weighted load balancing (>= 1).
    pub weight: u32,
    /// Current status (0=Unknown, 1=Healthy, 2=Unhealthy).
    /// Mutated only through health transitions.
    status: AtomicU8,
}

impl ServiceInstance {
    /// Create a new instance. Weight is floored at 1.
    pub fn new(id: impl Into<String>, url: Url, weight: u32) -> Self {
        Self {
            id: id.into(),
            url,
            weight: weight.max(1),
            status: AtomicU8::new(InstanceStatus::Unknown as u8),
        }
    }

    pub fn status(&self) -> InstanceStatus {
        self.status.load(Ordering::Relaxed).into()
    }

    pub(crate) fn set_status(&self, status: InstanceStatus) {
        self.status.store(status as u8, Ordering::Relaxed);
    }

    /// An instance is eligible for traffic unless it is known-unhealthy.
    /// Unknown counts as healthy so a cold start does not black-hole traffic.
    pub fn is_healthy(&self) -> bool {
        self.status.load(Ordering::Relaxed) != InstanceStatus::Unhealthy as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_counts_as_healthy() {
        let instance = ServiceInstance::new(
            "a",
            Url::parse("http://127.0.0.1:3001").unwrap(),
            1,
        );
        assert_eq!(instance.status(), InstanceStatus::Unknown);
        assert!(instance.is_healthy());

        instance.set_status(InstanceStatus::Unhealthy);
        assert!(!instance.is_healthy());

        instance.set_status(InstanceStatus::Healthy);
        assert!(instance.is_healthy());
    }

    #[test]
    fn weight_floored_at_one() {
        let instance = ServiceInstance::new(
            "a",
            Url::parse("http://127.0.0.1:3001").unwrap(),
            0,
        );
        assert_eq!(instance.weight, 1);
    }
}
