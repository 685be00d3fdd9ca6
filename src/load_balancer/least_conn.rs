//! Least-connections selection strategy.

use std::sync::Arc;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Selects the candidate with the fewest open connections.
/// Ties are broken by list order (first wins) — deterministic, no
/// fairness guarantee beyond that.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for LeastConnections {
    fn pick(
        &self,
        _service: &str,
        candidates: &[Arc<ServiceInstance>],
        ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        candidates
            .iter()
            .min_by_key(|c| ctx.tracker.open_connections(&c.id))
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }
}
