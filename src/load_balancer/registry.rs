//! Instance registry.
//!
//! # Responsibilities
//! - Own the live set of instances, keyed by id
//! - Register (idempotent upsert) and unregister instances
//! - Hand out deterministic, registration-ordered snapshots
//! - Publish registrations to the discovery store
//!
//! The map is sharded (`DashMap`) and every instance carries its own
//! synchronization, so unrelated instances never serialize on one lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::config::InstanceConfig;
use crate::load_balancer::instance::{Instance, InstanceSpec};
use crate::observability::metrics;
use crate::resilience::CircuitPolicy;
use crate::store::Discovery;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid instance address '{0}'")]
    InvalidAddress(String),
}

#[derive(Debug, Default)]
pub struct Registry {
    instances: DashMap<String, Arc<Instance>>,
    next_seq: AtomicU64,
    circuit: CircuitPolicy,
    discovery: Option<Discovery>,
}

impl Registry {
    pub fn new(circuit: CircuitPolicy) -> Self {
        Self {
            instances: DashMap::new(),
            next_seq: AtomicU64::new(0),
            circuit,
            discovery: None,
        }
    }

    pub fn with_discovery(mut self, discovery: Discovery) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Register an instance. Re-registering an identical spec returns the live
    /// instance untouched; a changed spec replaces it with fresh state while
    /// keeping its position in iteration order.
    pub async fn register(&self, spec: InstanceSpec) -> Arc<Instance> {
        let (instance, changed) = match self.instances.entry(spec.id.clone()) {
            Entry::Occupied(current) if current.get().matches(&spec) => (current.get().clone(), false),
            Entry::Occupied(mut current) => {
                let instance = Arc::new(Instance::new(spec, current.get().seq, self.circuit));
                current.insert(instance.clone());
                (instance, true)
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                let instance = Arc::new(Instance::new(spec, seq, self.circuit));
                slot.insert(instance.clone());
                (instance, true)
            }
        };

        if changed {
            tracing::info!(
                instance = %instance.id,
                address = %instance.authority(),
                weight = instance.weight,
                tags = ?instance.tags,
                "Registered instance"
            );
            metrics::record_registered(self.instances.len());
            if let Some(discovery) = &self.discovery {
                discovery.publish(&instance).await;
            }
        }
        instance
    }

    /// Register from a config entry.
    pub async fn register_config(&self, config: &InstanceConfig) -> Result<Arc<Instance>, RegistryError> {
        let mut spec = InstanceSpec::new(config.resolved_id(), &config.address)
            .ok_or_else(|| RegistryError::InvalidAddress(config.address.clone()))?
            .with_weight(config.weight);
        spec.tags = config.tags.clone();
        Ok(self.register(spec).await)
    }

    /// Remove an instance. Requests already holding it finish normally.
    pub async fn unregister(&self, id: &str) -> bool {
        if self.instances.remove(id).is_none() {
            return false;
        }
        tracing::info!(instance = %id, "Unregistered instance");
        metrics::record_registered(self.instances.len());
        if let Some(discovery) = &self.discovery {
            discovery.withdraw(id).await;
        }
        true
    }

    /// Make the set of instances tagged `tag` match `desired`.
    /// Instances without the tag are left alone.
    pub async fn sync_tagged(&self, tag: &str, desired: &[InstanceConfig]) {
        let wanted: Vec<&InstanceConfig> = desired
            .iter()
            .filter(|c| c.tags.iter().any(|t| t == tag))
            .collect();

        let stale: Vec<String> = self
            .all_instances()
            .into_iter()
            .filter(|i| i.tags.iter().any(|t| t == tag))
            .filter(|i| !wanted.iter().any(|c| c.resolved_id() == i.id))
            .map(|i| i.id.clone())
            .collect();

        for id in stale {
            self.unregister(&id).await;
        }
        for config in wanted {
            if let Err(e) = self.register_config(config).await {
                tracing::warn!(error = %e, "Skipping configured instance");
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Instance>> {
        self.instances.get(id).map(|e| e.value().clone())
    }

    /// Every instance, in registration order.
    pub fn all_instances(&self) -> Vec<Arc<Instance>> {
        let mut all: Vec<Arc<Instance>> = self.instances.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|i| i.seq);
        all
    }

    /// Healthy instances, in registration order. Reads live health state.
    pub fn healthy_instances(&self) -> Vec<Arc<Instance>> {
        let mut healthy = self.all_instances();
        healthy.retain(|i| i.is_healthy());
        healthy
    }

    /// Open connections across all instances.
    pub fn total_connections(&self) -> usize {
        self.instances.iter().map(|e| e.value().connections()).sum()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
