//! Proxy executor subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved route + inbound request
//!     → executor.rs (instance selection, breaker gate)
//!     → headers.rs (hop-by-hop sanitization)
//!     → attempt loop: forward, classify outcome, backoff, retry
//!     → relayed backend response
//!       or error.rs (taxonomy → error envelope)
//! ```
//!
//! # Design Decisions
//! - Health records update once per network attempt; breaker and
//!   request metrics update exactly once per request
//! - An open breaker rejects before any network call and is not
//!   counted as a new failure signal
//! - The caller only ever sees a clean relayed response or the envelope

pub mod error;
pub mod executor;
pub mod headers;

pub use error::DispatchError;
pub use executor::ProxyExecutor;
pub use headers::{strip_hop_by_hop, HOP_BY_HOP_HEADERS};
