//! Startup orchestration.
//!
//! # Responsibilities
//! - Compose every subsystem from a validated config, in dependency order
//! - Register the self instance, configured instances, and external instances
//! - Hand the composed state to the listeners
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use crate::config::{InstanceConfig, LbConfig};
use crate::health::HealthPolicy;
use crate::http::AppState;
use crate::load_balancer::{Registry, RegistryError, SelectionEngine};
use crate::proxy::{ProxySettings, RequestProxy};
use crate::resilience::CircuitPolicy;
use crate::scaling::{GlobalMetrics, ScalingAdvisor};
use crate::session::StickySessions;
use crate::store::{Discovery, KeyValueStore, MemoryStore};

/// The balancer identity: configured, or `lb-<uuid>`.
pub fn balancer_id(config: &LbConfig) -> String {
    let configured = config.balancer.id.trim();
    if configured.is_empty() {
        format!("lb-{}", uuid::Uuid::new_v4())
    } else {
        configured.to_string()
    }
}

/// The self instance as a registry entry, if enabled.
pub fn self_instance(config: &LbConfig) -> Option<InstanceConfig> {
    let own = &config.self_instance;
    own.enabled.then(|| InstanceConfig {
        id: Some(own.id.clone()),
        address: own.address.clone(),
        weight: own.weight,
        tags: own.tags.clone(),
    })
}

/// Build the full application state from `config`.
pub async fn bootstrap(config: &LbConfig) -> Result<AppState, RegistryError> {
    let lb_id = balancer_id(config);

    let store = MemoryStore::new();
    let shared: Arc<dyn KeyValueStore> = Arc::new(store.clone());

    let discovery = Discovery::new(shared.clone(), Duration::from_secs(config.discovery.ttl_secs));
    let registry = Arc::new(
        Registry::new(CircuitPolicy::from(&config.circuit_breaker)).with_discovery(discovery),
    );

    for entry in self_instance(config).iter().chain(config.instances.iter()) {
        registry.register_config(entry).await?;
    }

    let engine = Arc::new(SelectionEngine::new(
        registry.clone(),
        config.balancer.algorithm,
        config.balancer.rng_seed,
    ));
    let sessions = StickySessions::new(shared, Duration::from_secs(config.sessions.ttl_secs));
    let global = Arc::new(GlobalMetrics::new(Duration::from_secs(config.scaling.rps_window_secs)));
    let advisor = Arc::new(ScalingAdvisor::new(registry.clone(), global.clone(), config.scaling.clone()));

    let proxy = Arc::new(RequestProxy::new(
        registry.clone(),
        engine.clone(),
        sessions.clone(),
        global.clone(),
        ProxySettings {
            lb_id: lb_id.clone(),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            response_body_limit: config.listener.response_body_limit,
            health: HealthPolicy::from(&config.health_check),
        },
    ));

    tracing::info!(
        lb_id = %lb_id,
        algorithm = config.balancer.algorithm.as_str(),
        instances = registry.len(),
        "Balancer composed"
    );

    Ok(AppState {
        registry,
        engine,
        proxy,
        global,
        advisor,
        sessions,
        store,
        session_header: config.balancer.session_header.clone(),
        body_limit: config.listener.request_body_limit,
        admin_key: config.admin.api_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_id_when_unset() {
        let mut config = LbConfig::default();
        assert!(balancer_id(&config).starts_with("lb-"));
        config.balancer.id = "edge-1".into();
        assert_eq!(balancer_id(&config), "edge-1");
    }

    #[tokio::test]
    async fn registers_self_and_configured_instances_in_order() {
        let mut config = LbConfig::default();
        config.instances.push(InstanceConfig::tagged("10.0.0.2:3000", "external"));
        let state = bootstrap(&config).await.unwrap();

        let ids: Vec<String> = state.registry.all_instances().iter().map(|i| i.id.clone()).collect();
        assert_eq!(ids, vec!["self", "10.0.0.2:3000"]);
        assert_eq!(state.registry.get("self").unwrap().tags, vec!["self".to_string()]);
    }

    #[tokio::test]
    async fn self_instance_can_be_disabled() {
        let mut config = LbConfig::default();
        config.self_instance.enabled = false;
        let state = bootstrap(&config).await.unwrap();
        assert!(state.registry.is_empty());
    }
}
