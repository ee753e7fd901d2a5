//! Round-robin load balancing strategy.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use crate::load_balancer::{LoadBalancer, instance::Instance};

/// Round-robin selector.
/// Stores an internal counter to rotate through instances. The counter
/// advances on every call, whatever happens to the request afterwards.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        if instances.is_empty() {
            return None;
        }

        let ticket = self.counter.fetch_add(1, Ordering::AcqRel);
        Some(instances[ticket % instances.len()].clone())
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}
