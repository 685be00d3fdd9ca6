//! Circuit breaker for backend service protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, requests fail fast
//! - Half-Open: exactly one trial request probes recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: reset_timeout elapsed, evaluated lazily on next acquire
//! Half-Open → Closed: trial request succeeds (failure_count = 0)
//! Half-Open → Open: trial request fails (last_failure_at refreshed)
//! ```
//!
//! # Design Decisions
//! - One breaker per backend service, not per instance: a misbehaving
//!   fleet is isolated without per-instance bookkeeping
//! - The Open → Half-Open edge is taken on the next acquire, no timer task
//! - A rejected request is not itself a failure signal
//! - Admission hands out an RAII permit; an unsettled permit settles as
//!   a failure on drop, so an abandoned request (caller disconnect,
//!   panic mid-dispatch) can never strand the half-open trial slot

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// The three breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    /// Set while the single half-open trial is outstanding.
    trial_in_flight: bool,
}

/// Failure-isolation state machine for one backend service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    inner: Mutex<BreakerInner>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

/// Permission to attempt one request, handed out by [`CircuitBreaker::acquire`].
///
/// The holder settles the permit with `record_success` or
/// `record_failure`. A permit dropped unsettled counts as a failure:
/// the request was admitted but never reported back, and a half-open
/// trial slot must be returned either way.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    settled: bool,
}

impl BreakerPermit {
    /// Settle the permit as a successful request.
    pub fn record_success(mut self) {
        self.settled = true;
        self.breaker.on_success();
    }

    /// Settle the permit as a failed request.
    pub fn record_failure(mut self) {
        self.settled = true;
        self.breaker.on_failure();
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure();
        }
    }
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        let service = service.into();
        crate::observability::metrics::record_circuit_state(&service, CircuitState::Closed);
        Self {
            service,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
        }
    }

    /// Admit a request, or `None` when the breaker rejects it.
    ///
    /// Evaluates the Open → Half-Open edge lazily. In Half-Open the
    /// returned permit is the single trial slot; it is reclaimed when
    /// the permit is settled or dropped.
    pub fn acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        if self.try_acquire() {
            Some(BreakerPermit {
                breaker: self.clone(),
                settled: false,
            })
        } else {
            None
        }
    }

    fn try_acquire(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(
                        service = %self.service,
                        "Circuit breaker half-open, allowing trial request"
                    );
                    crate::observability::metrics::record_circuit_state(
                        &self.service,
                        CircuitState::HalfOpen,
                    );
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                inner.last_failure_at = None;
                tracing::info!(
                    service = %self.service,
                    "Circuit breaker closed after successful trial"
                );
                crate::observability::metrics::record_circuit_state(
                    &self.service,
                    CircuitState::Closed,
                );
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_failure_at = Some(Instant::now());
                    tracing::warn!(
                        service = %self.service,
                        failures = inner.failure_count,
                        "Circuit breaker opened"
                    );
                    crate::observability::metrics::record_circuit_state(
                        &self.service,
                        CircuitState::Open,
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_failure_at = Some(Instant::now());
                inner.trial_in_flight = false;
                tracing::warn!(
                    service = %self.service,
                    "Circuit breaker re-opened after failed trial"
                );
                crate::observability::metrics::record_circuit_state(
                    &self.service,
                    CircuitState::Open,
                );
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // The critical sections are a handful of field updates; a
        // poisoned lock can only mean a panic mid-update, so propagating
        // the inner value is safe.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Per-service breaker lookup, created lazily on first use.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    failure_threshold: u32,
    reset_timeout: Duration,
}

impl CircuitBreakerRegistry {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            failure_threshold: config.failure_threshold,
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        }
    }

    /// The breaker for a service, created closed on first access.
    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(service.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(
                    service,
                    self.failure_threshold,
                    self.reset_timeout,
                ))
            })
            .clone()
    }

    /// Current state per service, for the operator API.
    pub fn states(&self) -> Vec<(String, CircuitState)> {
        self.breakers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().state()))
            .collect()
    }
}
