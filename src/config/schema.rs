//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the traffic director.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LbConfig {
    /// Data-plane listener (bind address, body limit).
    pub listener: ListenerConfig,

    /// Balancer identity and selection algorithm.
    pub balancer: BalancerConfig,

    /// The process's own application port, registered at startup.
    pub self_instance: SelfInstanceConfig,

    /// Statically configured backend instances.
    pub instances: Vec<InstanceConfig>,

    /// Health check settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Sticky session settings.
    pub sessions: SessionConfig,

    /// Discovery store publication settings.
    pub discovery: DiscoveryConfig,

    /// Request-level circuit breaker.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Scaling advisor thresholds.
    pub scaling: ScalingConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin surface.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum buffered request body in bytes.
    pub request_body_limit: usize,

    /// Maximum buffered instance response body in bytes.
    pub response_body_limit: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_body_limit: 2 * 1024 * 1024,
            response_body_limit: 16 * 1024 * 1024,
        }
    }
}

/// Selection algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    RoundRobin,
    LeastConnections,
    LeastResponseTime,
    WeightedRoundRobin,
    #[default]
    HealthBased,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::RoundRobin => "round_robin",
            Algorithm::LeastConnections => "least_connections",
            Algorithm::LeastResponseTime => "least_response_time",
            Algorithm::WeightedRoundRobin => "weighted_round_robin",
            Algorithm::HealthBased => "health_based",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "round_robin" => Ok(Algorithm::RoundRobin),
            "least_connections" => Ok(Algorithm::LeastConnections),
            "least_response_time" => Ok(Algorithm::LeastResponseTime),
            "weighted_round_robin" => Ok(Algorithm::WeightedRoundRobin),
            "health_based" => Ok(Algorithm::HealthBased),
            other => Err(format!("unknown algorithm '{}'", other)),
        }
    }
}

/// Balancer identity and selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Identity sent downstream in the balancer header. Generated when empty.
    pub id: String,

    /// Selection algorithm.
    pub algorithm: Algorithm,

    /// Seed for the weighted selector's random source (reproducible runs).
    pub rng_seed: Option<u64>,

    /// Request header carrying the sticky session key.
    pub session_header: String,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            algorithm: Algorithm::default(),
            rng_seed: None,
            session_header: "x-session-id".to_string(),
        }
    }
}

/// The local application instance this process fronts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelfInstanceConfig {
    pub enabled: bool,
    pub id: String,
    /// Address of the local application (not the balancer listener).
    pub address: String,
    pub weight: u32,
    pub tags: Vec<String>,
}

impl Default for SelfInstanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id: "self".to_string(),
            address: "127.0.0.1:3000".to_string(),
            weight: 1,
            tags: vec!["self".to_string()],
        }
    }
}

/// Backend instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstanceConfig {
    /// Unique instance identifier. Defaults to the address.
    #[serde(default)]
    pub id: Option<String>,

    /// Instance address (e.g., "10.0.0.5:3000").
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Descriptive tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl InstanceConfig {
    /// A config entry for `address` with default weight and the given tag.
    pub fn tagged(address: impl Into<String>, tag: &str) -> Self {
        Self {
            id: None,
            address: address.into(),
            weight: default_weight(),
            tags: vec![tag.to_string()],
        }
    }

    /// The id this entry registers under.
    pub fn resolved_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.address.clone())
    }
}

fn default_weight() -> u32 {
    1
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub max_failures: u32,

    /// Number of consecutive successes before marking healthy again.
    pub recovery_requests: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 30,
            timeout_secs: 5,
            path: "/health".to_string(),
            max_failures: 3,
            recovery_requests: 2,
        }
    }
}

/// Timeout configuration for forwarded requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sticky session lifetime, refreshed on every write.
    pub ttl_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_secs: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Lifetime of published instance records.
    pub ttl_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Request-level circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive request failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds an open circuit rejects traffic before going half-open.
    pub open_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_secs: 30,
        }
    }
}

/// Scaling advisor thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScalingConfig {
    /// Average connections per healthy instance that calls for more capacity.
    pub high_connections: f64,

    /// Average response time (ms) that calls for more capacity.
    pub high_response_time_ms: f64,

    /// Average connections per instance below which capacity can shrink.
    pub low_connections: f64,

    /// Never suggest shrinking at or below this many instances.
    pub min_instances: usize,

    /// Sliding window for the requests-per-second estimate.
    pub rps_window_secs: u64,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            high_connections: 8.0,
            high_response_time_ms: 2000.0,
            low_connections: 2.0,
            min_instances: 2,
            rps_window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Upper bound on waiting for in-flight requests.
    pub drain_timeout_secs: u64,

    /// How often the drain loop re-reads connection counts.
    pub poll_interval_ms: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout_secs: 30,
            poll_interval_ms: 100,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: LbConfig = toml::from_str(
            r#"
            [balancer]
            algorithm = "weighted_round_robin"

            [[instances]]
            address = "10.0.0.1:3000"
            weight = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.balancer.algorithm, Algorithm::WeightedRoundRobin);
        assert_eq!(config.instances[0].weight, 3);
        assert_eq!(config.instances[0].resolved_id(), "10.0.0.1:3000");
        assert_eq!(config.health_check.max_failures, 3);
        assert_eq!(config.health_check.recovery_requests, 2);
        assert_eq!(config.health_check.interval_secs, 30);
        assert_eq!(config.sessions.ttl_secs, 3600);
        assert_eq!(config.discovery.ttl_secs, 300);
    }

    #[test]
    fn algorithm_parses_from_env_style_strings() {
        assert_eq!("least_connections".parse::<Algorithm>(), Ok(Algorithm::LeastConnections));
        assert!("fastest".parse::<Algorithm>().is_err());
    }
}
