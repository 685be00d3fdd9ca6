//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Rotates through candidates using one monotonic counter per service.
///
/// The counter is atomic: concurrent selections may interleave but never
/// lose an update, so the rotation is cyclic over time.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next(&self, service: &str) -> usize {
        self.counters
            .entry(service.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed)
    }
}

impl SelectionStrategy for RoundRobin {
    fn pick(
        &self,
        service: &str,
        candidates: &[Arc<ServiceInstance>],
        _ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        let index = self.next(service) % candidates.len();
        candidates[index].clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::HealthTracker;
    use url::Url;

    fn instances(count: usize) -> Vec<Arc<ServiceInstance>> {
        (0..count)
            .map(|i| {
                Arc::new(ServiceInstance::new(
                    format!("i{}", i),
                    Url::parse(&format!("http://127.0.0.1:{}", 3001 + i)).unwrap(),
                    1,
                ))
            })
            .collect()
    }

    #[test]
    fn selection_is_cyclic_and_even() {
        let tracker = HealthTracker::new(3, 2);
        let ctx = SelectionContext {
            tracker: &tracker,
            client_key: None,
        };
        let strategy = RoundRobin::new();
        let candidates = instances(3);

        let mut counts = [0usize; 3];
        let mut order = Vec::new();
        for _ in 0..9 {
            let picked = strategy.pick("orders", &candidates, &ctx);
            let idx = candidates.iter().position(|c| c.id == picked.id).unwrap();
            counts[idx] += 1;
            order.push(idx);
        }

        assert_eq!(counts, [3, 3, 3]);
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn counters_are_independent_per_service() {
        let tracker = HealthTracker::new(3, 2);
        let ctx = SelectionContext {
            tracker: &tracker,
            client_key: None,
        };
        let strategy = RoundRobin::new();
        let candidates = instances(2);

        let a = strategy.pick("orders", &candidates, &ctx);
        let b = strategy.pick("payments", &candidates, &ctx);
        assert_eq!(a.id, b.id, "each service starts its own rotation");
    }
}
