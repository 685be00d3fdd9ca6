//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (request id, tracing, timeout layers)
//!     → dispatch handler (route resolution → proxy executor)
//!     → relayed backend response or error envelope
//!
//! Operator polling:
//!     GET /__gateway/metrics   → request metrics snapshot
//!     GET /__gateway/health    → per-instance health records
//!     GET /__gateway/circuits  → per-service breaker states
//! ```

pub mod server;

pub use server::{AppState, HttpServer};
