//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Initialize subsystems → Start listener
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → broadcast → server drains, poller exits
//! ```
//!
//! # Design Decisions
//! - Subsystems initialize in dependency order, fail fast on any error
//! - In-memory state is intentionally not persisted: on restart every
//!   instance starts "assume healthy" and every breaker starts closed

pub mod shutdown;

pub use shutdown::{listen_for_signals, Shutdown};
