//! In-process TTL key/value store.

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use super::{KeyValueStore, StoreError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe, TTL-aware map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Purge expired entries every `every` until shutdown.
    pub fn spawn_janitor(&self, every: Duration, mut shutdown: broadcast::Receiver<()>) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = store.purge();
                        if removed > 0 {
                            tracing::debug!(removed, "Purged expired store entries");
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Store janitor stopping");
                        break;
                    }
                }
            }
        })
    }

    fn purge(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| entry.is_live(now));
        before.saturating_sub(self.inner.len())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let expired = match self.inner.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            // Drop lazily, unless it was rewritten meanwhile.
            self.inner.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        self.inner.insert(key.to_string(), Entry {
            value,
            expires_at: Instant::now() + ttl,
        });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let now = Instant::now();
        Ok(self
            .inner
            .remove(key)
            .map(|(_, entry)| entry.is_live(now))
            .unwrap_or(false))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let before = self.inner.len();
        self.inner.retain(|key, _| !key.starts_with(prefix));
        Ok(before.saturating_sub(self.inner.len()))
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(self.purge())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v".into(), Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".into()));

        time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty(), "expired entry is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn set_refreshes_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v".into(), Duration::from_secs(10)).await.unwrap();
        time::advance(Duration::from_secs(8)).await;
        store.set("k", "v".into(), Duration::from_secs(10)).await.unwrap();
        time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.get("k").await.unwrap(), Some("v".into()));
    }

    #[tokio::test]
    async fn delete_prefix_scans_keys() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set("lb:session:a", "1".into(), ttl).await.unwrap();
        store.set("lb:session:b", "2".into(), ttl).await.unwrap();
        store.set("lb:instance:x", "3".into(), ttl).await.unwrap();

        assert_eq!(store.delete_prefix("lb:session:").await.unwrap(), 2);
        assert_eq!(store.get("lb:instance:x").await.unwrap(), Some("3".into()));
        assert!(store.delete("lb:instance:x").await.unwrap());
        assert!(!store.delete("lb:instance:x").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_counts_only_expired() {
        let store = MemoryStore::new();
        store.set("short", "1".into(), Duration::from_secs(1)).await.unwrap();
        store.set("long", "2".into(), Duration::from_secs(100)).await.unwrap();
        time::advance(Duration::from_secs(2)).await;

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.len(), 1);
    }
}
