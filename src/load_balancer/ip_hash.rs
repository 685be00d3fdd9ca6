//! IP-hash selection strategy.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Deterministic hash of the client key modulo candidate count. The same
/// key maps to the same instance as long as the candidate set is
/// unchanged — session affinity without explicit state. Requests with no
/// client key all hash the empty key.
#[derive(Debug, Default)]
pub struct IpHash;

impl IpHash {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for IpHash {
    fn pick(
        &self,
        _service: &str,
        candidates: &[Arc<ServiceInstance>],
        ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        let key = ctx.client_key.unwrap_or("");
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % candidates.len();
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
                    Url::parse("http://127.0.0.1:3001").unwrap(),
                    1,
                ))
            })
            .collect()
    }

    #[test]
    fn same_key_always_maps_to_same_instance() {
        let tracker = HealthTracker::new(3, 2);
        let strategy = IpHash::new();
        let candidates = instances(5);
        let ctx = SelectionContext {
            tracker: &tracker,
            client_key: Some("203.0.113.7"),
        };

        let first = strategy.pick("orders", &candidates, &ctx);
        for _ in 0..20 {
            assert_eq!(strategy.pick("orders", &candidates, &ctx).id, first.id);
        }
    }

    #[test]
    fn distinct_keys_spread_across_instances() {
        let tracker = HealthTracker::new(3, 2);
        let strategy = IpHash::new();
        let candidates = instances(4);

        let mut seen = std::collections::HashSet::new();
        for i in 0..64 {
            let key = format!("10.0.0.{}", i);
            let ctx = SelectionContext {
                tracker: &tracker,
                client_key: Some(&key),
            };
            seen.insert(strategy.pick("orders", &candidates, &ctx).id.clone());
        }
        assert!(seen.len() > 1, "64 keys should not all collide");
    }
}
