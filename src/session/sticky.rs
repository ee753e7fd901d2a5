//! Sticky session store.
//!
//! Maps an opaque session key to an instance id in the shared key/value store
//! under `lb:session:<key>`. A mapping is only served while its instance is
//! registered and healthy; stale affinity is discarded, never served.

use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{Instance, Registry};
use crate::observability::metrics;
use crate::store::{KeyValueStore, StoreError};

pub const SESSION_PREFIX: &str = "lb:session:";

#[derive(Clone)]
pub struct StickySessions {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl StickySessions {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn key(session: &str) -> String {
        format!("{}{}", SESSION_PREFIX, session)
    }

    /// The instance `session` is bound to, if it can still take traffic.
    /// Store failures degrade to "no affinity".
    pub async fn get(&self, session: &str, registry: &Registry) -> Option<Arc<Instance>> {
        let id = match self.store.get(&Self::key(session)).await {
            Ok(Some(id)) => id,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(session, error = %e, "Sticky session lookup failed");
                metrics::record_store_error("session_get");
                return None;
            }
        };

        match registry.get(&id) {
            Some(instance) if instance.is_healthy() => Some(instance),
            _ => {
                tracing::debug!(session, instance = %id, "Discarding stale session affinity");
                None
            }
        }
    }

    /// Bind `session` to `instance_id`, refreshing the TTL.
    pub async fn set(&self, session: &str, instance_id: &str) {
        if let Err(e) = self.try_set(session, instance_id).await {
            tracing::warn!(session, instance = %instance_id, error = %e, "Failed to write sticky session");
            metrics::record_store_error("session_set");
        }
    }

    async fn try_set(&self, session: &str, instance_id: &str) -> Result<(), StoreError> {
        self.store.set(&Self::key(session), instance_id.to_string(), self.ttl).await
    }

    /// Drop every session bound to anything.
    pub async fn clear(&self) -> usize {
        match self.store.delete_prefix(SESSION_PREFIX).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to clear sticky sessions");
                metrics::record_store_error("session_clear");
                0
            }
        }
    }
}

impl std::fmt::Debug for StickySessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickySessions").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::time;
    use crate::health::HealthPolicy;
    use crate::load_balancer::InstanceSpec;
    use crate::store::MemoryStore;

    async fn registry_with(ids: &[&str]) -> Registry {
        let registry = Registry::default();
        for (i, id) in ids.iter().enumerate() {
            let spec = InstanceSpec::new(*id, &format!("10.0.0.1:{}", 3000 + i)).unwrap();
            registry.register(spec).await;
        }
        registry
    }

    #[tokio::test]
    async fn returns_mapped_instance_while_healthy() {
        let registry = registry_with(&["a", "b"]).await;
        let sessions = StickySessions::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));

        sessions.set("user-1", "a").await;
        assert_eq!(sessions.get("user-1", &registry).await.unwrap().id, "a");

        let policy = HealthPolicy { max_failures: 1, recovery_requests: 1 };
        registry.get("a").unwrap().record_probe(false, &policy);
        assert!(sessions.get("user-1", &registry).await.is_none());
    }

    #[tokio::test]
    async fn unknown_instance_is_not_served() {
        let registry = registry_with(&["a"]).await;
        let sessions = StickySessions::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
        sessions.set("user-1", "gone").await;
        assert!(sessions.get("user-1", &registry).await.is_none());
        assert!(sessions.get("never-set", &registry).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn mapping_expires_and_writes_refresh_it() {
        let registry = registry_with(&["a"]).await;
        let sessions = StickySessions::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));

        sessions.set("user-1", "a").await;
        time::advance(Duration::from_secs(50)).await;
        sessions.set("user-1", "a").await;
        time::advance(Duration::from_secs(50)).await;
        assert!(sessions.get("user-1", &registry).await.is_some());

        time::advance(Duration::from_secs(11)).await;
        assert!(sessions.get("user-1", &registry).await.is_none());
    }

    #[tokio::test]
    async fn clear_removes_only_sessions() {
        let store = Arc::new(MemoryStore::new());
        let sessions = StickySessions::new(store.clone(), Duration::from_secs(60));
        sessions.set("u1", "a").await;
        sessions.set("u2", "b").await;
        store.set("lb:instance:a", "{}".into(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(sessions.clear().await, 2);
        assert_eq!(store.len(), 1);
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn set(&self, _: &str, _: String, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn delete_prefix(&self, _: &str) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn purge_expired(&self) -> Result<usize, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn store_outage_degrades_to_no_affinity() {
        let registry = registry_with(&["a"]).await;
        let sessions = StickySessions::new(Arc::new(BrokenStore), Duration::from_secs(60));
        sessions.set("u1", "a").await;
        assert!(sessions.get("u1", &registry).await.is_none());
        assert_eq!(sessions.clear().await, 0);
    }
}
