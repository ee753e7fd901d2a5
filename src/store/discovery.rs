//! Cross-process instance publication.
//!
//! Registered instances are written under `lb:instance:<id>` with a short TTL
//! so other processes sharing the store can see them. Writes are best effort:
//! a failing store never blocks registration, but every failure is logged and
//! counted.

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::load_balancer::instance::Instance;
use crate::observability::metrics;
use super::{KeyValueStore, StoreError};

pub const INSTANCE_PREFIX: &str = "lb:instance:";

/// What other processes read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub weight: u32,
    pub tags: Vec<String>,
    pub registered_at: u64,
}

impl From<&Instance> for InstanceRecord {
    fn from(instance: &Instance) -> Self {
        Self {
            id: instance.id.clone(),
            host: instance.host.clone(),
            port: instance.port,
            weight: instance.weight,
            tags: instance.tags.clone(),
            registered_at: instance.registered_at,
        }
    }
}

#[derive(Clone)]
pub struct Discovery {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl Discovery {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(id: &str) -> String {
        format!("{}{}", INSTANCE_PREFIX, id)
    }

    pub async fn publish(&self, instance: &Instance) {
        if let Err(e) = self.try_publish(instance).await {
            tracing::warn!(instance = %instance.id, error = %e, "Failed to publish instance to discovery store");
            metrics::record_store_error("discovery_publish");
        }
    }

    async fn try_publish(&self, instance: &Instance) -> Result<(), StoreError> {
        let record = InstanceRecord::from(instance);
        let value = serde_json::to_string(&record).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.store.set(&Self::key(&instance.id), value, self.ttl).await
    }

    pub async fn withdraw(&self, id: &str) {
        if let Err(e) = self.store.delete(&Self::key(id)).await {
            tracing::warn!(instance = %id, error = %e, "Failed to withdraw instance from discovery store");
            metrics::record_store_error("discovery_withdraw");
        }
    }

    /// Read a published record (used by peers and tests).
    pub async fn lookup(&self, id: &str) -> Result<Option<InstanceRecord>, StoreError> {
        match self.store.get(&Self::key(id)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StoreError::Encode(e.to_string())),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for Discovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Discovery").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}
