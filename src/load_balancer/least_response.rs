//! Least-response-time selection strategy.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Selects the candidate with the smallest running-average response time.
/// Instances with no samples report 0 and are therefore preferred; ties
/// break by list order (first wins).
#[derive(Debug, Default)]
pub struct LeastResponseTime;

impl LeastResponseTime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for LeastResponseTime {
    fn pick(
        &self,
        _service: &str,
        candidates: &[Arc<ServiceInstance>],
        ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        candidates
            .iter()
            .min_by(|a, b| {
                let ra = ctx.tracker.avg_response_time_ms(&a.id);
                let rb = ctx.tracker.avg_response_time_ms(&b.id);
                ra.partial_cmp(&rb).unwrap_or(Ordering::Equal)
            })
            .cloned()
            .unwrap_or_else(|| candidates[0].clone())
    }
}
