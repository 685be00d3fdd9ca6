//! Weighted round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Round-robin over the weight-expanded candidate list: an instance with
/// weight `w` occupies `w` consecutive slots of the rotation, so it
/// receives proportionally more selections. The expansion is arithmetic,
/// the list is never materialized.
#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    counters: DashMap<String, AtomicUsize>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self, service: &str) -> usize {
        self.counters
            .entry(service.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed)
    }
}

impl SelectionStrategy for WeightedRoundRobin {
    fn pick(
        &self,
        service: &str,
        candidates: &[Arc<ServiceInstance>],
        _ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        let total: usize = candidates.iter().map(|c| c.weight.max(1) as usize).sum();
        let mut slot = self.next(service) % total;

        for candidate in candidates {
            let weight = candidate.weight.max(1) as usize;
            if slot < weight {
                return candidate.clone();
            }
            slot -= weight;
        }

        // Unreachable: slot < total by construction.
        candidates[candidates.len() - 1].clone()
    }
}
