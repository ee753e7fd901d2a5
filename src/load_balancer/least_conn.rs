//! Least Connections load balancing strategy.

use std::sync::Arc;
use crate::load_balancer::{LoadBalancer, instance::Instance};

/// Least connections selector.
/// Selects the instance with the minimum number of open connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        // min_by_key keeps the first of equal elements, so ties go to
        // registration order.
        instances
            .iter()
            .min_by_key(|i| i.connections())
            .cloned()
    }

    fn name(&self) -> &'static str {
        "least_connections"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::instance::tests::instance;

    #[test]
    fn test_least_conn() {
        let lb = LeastConnections::new();
        let b1 = instance("b1", 0);
        let b2 = instance("b2", 1);

        // artificially increase connections on b1
        let _g1 = b1.acquire();

        let instances = vec![b1.clone(), b2.clone()];

        // Should pick b2 (0 connections)
        let s1 = lb.next_server(&instances).unwrap();
        assert_eq!(s1.id, b2.id);

        // now b2 has 2, b1 has 1
        let _g2 = b2.acquire();
        let _g3 = b2.acquire();

        let s2 = lb.next_server(&instances).unwrap();
        assert_eq!(s2.id, b1.id);
    }

    #[test]
    fn ties_go_to_first_registered() {
        let lb = LeastConnections::new();
        let instances = vec![instance("first", 0), instance("second", 1)];
        for _ in 0..3 {
            assert_eq!(lb.next_server(&instances).unwrap().id, "first");
        }
    }
}
