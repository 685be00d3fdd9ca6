//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend service:
//!     → circuit_breaker.rs (gate: may this request be attempted at all?)
//!     → attempt fails → backoff.rs (exponential delay before retry)
//!     → outcome → circuit_breaker.rs (failure/success bookkeeping)
//! ```
//!
//! # Design Decisions
//! - Breakers are service-scoped: one bad fleet is isolated wholesale
//! - An open breaker fails fast; no network call, no failure counted
//! - Backoff is jittered to prevent retry storms

pub mod backoff;
pub mod circuit_breaker;

pub use backoff::retry_delay;
pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
