//! Weighted round robin via cumulative-weight sampling.
//!
//! Each call draws uniformly from `[0, total_weight)` and walks the list,
//! subtracting weights until the draw lands inside an instance's slice.
//! The random source is injectable so selection is reproducible under a seed.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::load_balancer::{LoadBalancer, instance::Instance};

#[derive(Debug)]
pub struct WeightedRoundRobin<R = StdRng> {
    rng: Mutex<R>,
}

impl WeightedRoundRobin<StdRng> {
    /// Seeded when `seed` is given, otherwise seeded from the OS.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(rng)
    }
}

impl<R: Rng + Send + Debug> WeightedRoundRobin<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng: Mutex::new(rng) }
    }
}

impl<R: Rng + Send + Debug> LoadBalancer for WeightedRoundRobin<R> {
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>> {
        let total: u64 = instances.iter().map(|i| u64::from(i.weight)).sum();
        if total == 0 {
            return None;
        }

        let mut draw = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen_range(0..total)
        };

        for instance in instances {
            let weight = u64::from(instance.weight);
            if draw < weight {
                return Some(instance.clone());
            }
            draw -= weight;
        }

        // Unreachable while draw < total; keep a defined answer anyway.
        instances.last().cloned()
    }

    fn name(&self) -> &'static str {
        "weighted_round_robin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::instance::{InstanceSpec, Instance};
    use crate::resilience::CircuitPolicy;

    fn weighted(id: &str, seq: u64, weight: u32) -> Arc<Instance> {
        let spec = InstanceSpec::new(id, &format!("127.0.0.1:{}", 9100 + seq))
            .unwrap()
            .with_weight(weight);
        Arc::new(Instance::new(spec, seq, CircuitPolicy::default()))
    }

    #[test]
    fn frequencies_follow_weights() {
        let lb = WeightedRoundRobin::new(Some(42));
        let instances = vec![weighted("a", 0, 1), weighted("b", 1, 2), weighted("c", 2, 1)];

        let trials = 10_000;
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            let picked = lb.next_server(&instances).unwrap();
            let idx = instances.iter().position(|i| i.id == picked.id).unwrap();
            counts[idx] += 1;
        }

        let expected = [0.25, 0.5, 0.25];
        for (count, share) in counts.iter().zip(expected) {
            let observed = *count as f64 / trials as f64;
            assert!((observed - share).abs() < 0.03, "observed {} expected {}", observed, share);
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let instances = vec![weighted("a", 0, 3), weighted("b", 1, 1), weighted("c", 2, 5)];
        let run = |seed| {
            let lb = WeightedRoundRobin::new(Some(seed));
            (0..50).map(|_| lb.next_server(&instances).unwrap().id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn empty_set_selects_nothing() {
        assert!(WeightedRoundRobin::new(Some(1)).next_server(&[]).is_none());
    }
}
