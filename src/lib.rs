//! Gateway dispatch layer.
//!
//! The component fleet-fronting core of the gateway: for every inbound
//! request it resolves which backend service and instance should handle
//! it, forwards with bounded retries and backoff, isolates failing
//! services behind per-service circuit breakers, and keeps instance
//! health and load statistics feeding future routing decisions.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                 GATEWAY DISPATCH                 │
//!  Request ───────┼─▶ http ─▶ registry (route) ─▶ load_balancer ─────┼──▶ Backend
//!                 │              │                    │              │    instance
//!                 │              │              resilience (breaker, │
//!                 │              │               retries, backoff)   │
//!  Response ◀─────┼─── proxy executor ◀──────────────┘               │
//!                 │                                                  │
//!                 │   cross-cutting: config · observability ·        │
//!                 │                  lifecycle · health polling      │
//!                 └──────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod proxy;
pub mod registry;

// Traffic management
pub mod load_balancer;
pub mod resilience;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::LoadBalancer;
pub use observability::MetricsAggregator;
pub use proxy::{DispatchError, ProxyExecutor};
pub use registry::ServiceRegistry;
pub use resilience::CircuitBreakerRegistry;
