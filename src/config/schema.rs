//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway dispatch layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Backend service definitions (name, instances, retry policy).
    pub services: Vec<ServiceConfig>,

    /// Route definitions mapping inbound requests to services.
    pub routes: Vec<RouteConfig>,

    /// Load balancer settings (algorithm, sticky sessions).
    pub load_balancer: BalancerConfig,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Proxy executor settings.
    pub proxy: ProxySettings,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// A backend service and its instances.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Unique service name, referenced by routes.
    pub name: String,

    /// Path probed by the active health checker.
    #[serde(default = "default_health_path")]
    pub health_check_path: String,

    /// Base request timeout for this service in seconds.
    /// Routes may override; absent means the proxy-wide default applies.
    pub base_timeout_secs: Option<u64>,

    /// Retry policy applied when forwarding to this service.
    #[serde(default)]
    pub retry: RetryPolicyConfig,

    /// Instances serving this service.
    pub instances: Vec<InstanceConfig>,
}

fn default_health_path() -> String {
    "/health".to_string()
}

/// A single backend instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Instance identifier; derived from the URL authority when absent.
    pub id: Option<String>,

    /// Base URL of the instance (e.g., "http://127.0.0.1:3001").
    pub url: String,

    /// Weight for weighted load balancing (default: 1, minimum: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Per-service retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicyConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Cap on the backoff delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 10_000,
        }
    }
}

/// Route configuration mapping inbound requests to a target service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Path prefix to match (longest prefix wins, declaration order breaks ties).
    pub path_prefix: String,

    /// Target service name.
    pub service: String,

    /// HTTP method to match; absent matches any method.
    pub method: Option<String>,

    /// Whether the surrounding auth middleware must have authenticated
    /// the request. Carried for the middleware chain, not enforced here.
    #[serde(default)]
    pub requires_auth: bool,

    /// Strip the matched prefix before forwarding.
    #[serde(default)]
    pub strip_path_prefix: bool,

    /// Per-route timeout override in seconds.
    pub timeout_secs: Option<u64>,

    /// Per-route rate limit override (requests per second). Carried for
    /// the middleware chain, not enforced here.
    pub rate_limit: Option<u32>,
}

/// Load balancing algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    #[default]
    RoundRobin,
    WeightedRoundRobin,
    LeastConnections,
    LeastResponseTime,
    IpHash,
    Random,
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Selection algorithm.
    pub algorithm: Algorithm,

    /// Sticky session settings.
    pub sticky_sessions: StickySessionConfig,
}

/// Sticky session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StickySessionConfig {
    /// Enable client-to-instance affinity.
    pub enabled: bool,

    /// Affinity entry time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for StickySessionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 300,
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the active health check loop.
    pub enabled: bool,

    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// Per-probe timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failures before marking an instance unhealthy.
    pub failure_threshold: u32,

    /// Consecutive successes before marking an instance healthy again.
    pub recovery_threshold: u32,

    /// Maximum concurrent probes per poll cycle.
    pub probe_concurrency: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            failure_threshold: 3,
            recovery_threshold: 2,
            probe_concurrency: 8,
        }
    }
}

/// Circuit breaker configuration (per backend service).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,

    /// Time the breaker stays open before allowing a trial request, in seconds.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_secs: 60,
        }
    }
}

/// Proxy executor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Default per-request deadline in seconds, used when neither the
    /// route nor the service specifies one.
    pub default_timeout_secs: u64,

    /// Maximum buffered request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            default_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
