//! Shutdown coordination for the balancer.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::load_balancer::Registry;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Debug)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for the registry's in-flight requests to reach zero, polling every
/// `poll`, for at most `timeout`. Returns whether the drain completed.
pub async fn drain(registry: &Registry, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = registry.total_connections();
        if remaining == 0 {
            tracing::info!("All in-flight requests drained");
            return true;
        }
        if Instant::now() >= deadline {
            tracing::warn!(remaining, "Drain deadline reached, abandoning in-flight requests");
            return false;
        }
        tracing::debug!(remaining, "Waiting for in-flight requests");
        time::sleep(poll.min(deadline.saturating_duration_since(Instant::now()))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::InstanceSpec;

    #[tokio::test]
    async fn trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_guards() {
        let registry = Registry::default();
        let instance = registry.register(InstanceSpec::new("a", "10.0.0.1:3000").unwrap()).await;
        let guard = instance.acquire();

        tokio::spawn(async move {
            time::sleep(Duration::from_millis(250)).await;
            drop(guard);
        });

        assert!(drain(&registry, Duration::from_secs(30), Duration::from_millis(100)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_at_deadline() {
        let registry = Registry::default();
        let instance = registry.register(InstanceSpec::new("a", "10.0.0.1:3000").unwrap()).await;
        let _stuck = instance.acquire();

        let started = Instant::now();
        assert!(!drain(&registry, Duration::from_secs(2), Duration::from_millis(100)).await);
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(instance.connections(), 1);
    }
}
