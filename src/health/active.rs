//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered instance, concurrently
//! - Feed results into each instance's state machine
//! - Keep one instance's probe from delaying or failing another's

use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tokio::sync::broadcast;
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use axum::http::{Request, StatusCode};
use axum::body::Body;

use crate::config::HealthCheckConfig;
use crate::health::{report_transition, state::HealthPolicy};
use crate::load_balancer::{Instance, Registry};
use crate::observability::metrics;
use crate::resilience::with_timeout;

/// Why a probe counted as a failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    #[error("timed out")]
    Timeout,
    #[error("connection error: {0}")]
    Connect(String),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("invalid probe request: {0}")]
    InvalidRequest(String),
}

/// Result of one probe cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub healthy: usize,
    pub unhealthy: usize,
}

pub struct HealthMonitor {
    registry: Arc<Registry>,
    config: HealthCheckConfig,
    policy: HealthPolicy,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(registry: Arc<Registry>, config: HealthCheckConfig) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            registry,
            policy: HealthPolicy::from(&config),
            config,
            client,
        }
    }

    /// Probe on a fixed interval until shutdown. The first cycle runs immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run one cycle over every registered instance.
    pub async fn check_all(&self) -> CycleSummary {
        let instances = self.registry.all_instances();
        let outcomes = join_all(instances.iter().map(|i| self.check(i))).await;

        let summary = outcomes.iter().fold(CycleSummary::default(), |mut acc, healthy| {
            if *healthy { acc.healthy += 1 } else { acc.unhealthy += 1 }
            acc
        });

        tracing::debug!(healthy = summary.healthy, unhealthy = summary.unhealthy, "Health check cycle complete");
        summary
    }

    /// Probe one instance and record the outcome. Returns its health afterwards.
    async fn check(&self, instance: &Arc<Instance>) -> bool {
        let outcome = self.probe(instance).await;
        if let Err(failure) = &outcome {
            tracing::debug!(instance = %instance.id, reason = %failure, "Health probe failed");
        }

        if let Some(transition) = instance.record_probe(outcome.is_ok(), &self.policy) {
            report_transition(instance, transition, "probe");
        }

        let healthy = instance.is_healthy();
        metrics::record_instance_health(&instance.id, healthy);
        healthy
    }

    async fn probe(&self, instance: &Instance) -> Result<(), ProbeFailure> {
        let uri = format!("http://{}{}", instance.authority(), self.config.path);
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "traffic-director-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeFailure::InvalidRequest(e.to_string()))?;

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match with_timeout(timeout, self.client.request(request)).await {
            Ok(Ok(response)) if response.status() == StatusCode::OK => Ok(()),
            Ok(Ok(response)) => Err(ProbeFailure::Status(response.status())),
            Ok(Err(e)) => Err(ProbeFailure::Connect(e.to_string())),
            Err(_) => Err(ProbeFailure::Timeout),
        }
    }
}
