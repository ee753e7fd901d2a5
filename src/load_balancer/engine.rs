//! Selection engine: healthy candidates in, exactly one instance out.

use std::sync::Arc;
use arc_swap::ArcSwap;

use crate::config::Algorithm;
use crate::load_balancer::{create_load_balancer, Instance, LoadBalancer, Registry};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectError {
    #[error("no healthy instances available")]
    NoHealthyInstances,
}

#[derive(Debug)]
struct Active {
    algorithm: Algorithm,
    balancer: Box<dyn LoadBalancer>,
}

/// Applies the configured algorithm to the registry's healthy set.
/// The algorithm can be swapped at runtime (config reload) without locking
/// the request path.
pub struct SelectionEngine {
    registry: Arc<Registry>,
    active: ArcSwap<Active>,
    seed: Option<u64>,
}

impl SelectionEngine {
    pub fn new(registry: Arc<Registry>, algorithm: Algorithm, seed: Option<u64>) -> Self {
        Self::with_balancer(registry, algorithm, create_load_balancer(algorithm, seed), seed)
    }

    /// Use a caller-built balancer, e.g. one with an injected random source.
    pub fn with_balancer(
        registry: Arc<Registry>,
        algorithm: Algorithm,
        balancer: Box<dyn LoadBalancer>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            registry,
            active: ArcSwap::from_pointee(Active { algorithm, balancer }),
            seed,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.active.load().algorithm
    }

    /// Switch algorithms. A no-op if `algorithm` is already active.
    pub fn set_algorithm(&self, algorithm: Algorithm) {
        if self.algorithm() == algorithm {
            return;
        }
        self.active.store(Arc::new(Active {
            algorithm,
            balancer: create_load_balancer(algorithm, self.seed),
        }));
        tracing::info!(algorithm = algorithm.as_str(), "Selection algorithm changed");
    }

    /// Healthy instances whose circuit admits traffic, minus `exclude`.
    pub fn candidates(&self, exclude: Option<&str>) -> Vec<Arc<Instance>> {
        let mut candidates = self.registry.healthy_instances();
        candidates.retain(|i| Some(i.id.as_str()) != exclude && i.circuit_allows());
        candidates
    }

    pub fn select(&self, exclude: Option<&str>) -> Result<Arc<Instance>, SelectError> {
        let candidates = self.candidates(exclude);
        let active = self.active.load();
        let picked = active
            .balancer
            .next_server(&candidates)
            .ok_or(SelectError::NoHealthyInstances)?;

        tracing::debug!(
            instance = %picked.id,
            algorithm = active.balancer.name(),
            candidates = candidates.len(),
            "Selected instance"
        );
        Ok(picked)
    }
}
