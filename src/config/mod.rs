//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Invalid values fail fast at startup, never at dispatch time

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    Algorithm, BalancerConfig, CircuitBreakerConfig, GatewayConfig, HealthCheckConfig,
    InstanceConfig, ListenerConfig, ObservabilityConfig, ProxySettings, RetryPolicyConfig,
    RouteConfig, ServiceConfig, StickySessionConfig,
};
