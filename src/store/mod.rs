//! Shared key/value store collaborator.
//!
//! # Data Flow
//! ```text
//! registry register/unregister → discovery.rs → lb:instance:<id>   (TTL 5 min)
//! sticky sessions              → session/     → lb:session:<key>   (TTL 1 h)
//! ```
//!
//! # Design Decisions
//! - The balancer only needs get/set-with-TTL/delete; the trait stays that small
//! - Prefix deletion and expiry purging really scan the store, no estimates
//! - `MemoryStore` backs single-process deployments and every test

use std::time::Duration;
use async_trait::async_trait;

pub mod discovery;
pub mod memory;

pub use discovery::{Discovery, InstanceRecord};
pub use memory::MemoryStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode value: {0}")]
    Encode(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value`, replacing any previous value and its expiry.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every key starting with `prefix`; returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Drop expired entries; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, StoreError>;
}
