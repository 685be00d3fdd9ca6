//! Uniform random selection strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{SelectionContext, SelectionStrategy};
use crate::registry::ServiceInstance;

/// Uniform random pick over the healthy candidates.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for Random {
    fn pick(
        &self,
        _service: &str,
        candidates: &[Arc<ServiceInstance>],
        _ctx: &SelectionContext<'_>,
    ) -> Arc<ServiceInstance> {
        let index = rand::thread_rng().gen_range(0..candidates.len());
        candidates[index].clone()
    }
}
