//! Least response time load balancing strategy.

use std::cmp::Ordering;
use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, instance::Instance};

/// Selects the instance with the lowest smoothed response time.
#[derive(Debug, Default)]
pub struct LeastResponseTime;

impl LeastResponseTime {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastResponseTime {
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        instances
            .iter()
            .min_by(|a, b| {
                a.avg_response_ms()
                    .partial_cmp(&b.avg_response_ms())
                    .unwrap_or(Ordering::Equal)
            })
            .cloned()
    }

    fn name(&self) -> &'static str {
        "least_response_time"
    }
}
