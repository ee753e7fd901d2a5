//! Backend instance abstraction.
//!
//! # Responsibilities
//! - Represent a single backend process (identity, weight, tags)
//! - Track open connections (for Least Connections) with an RAII guard
//! - Track request/error counters and smoothed response time
//! - Hold health state and the request-level circuit breaker
//!
//! Counters are atomics; the health record sits behind the instance's own
//! lock, so concurrent updates to one instance never contend with another.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::ops::Deref;
use serde::Serialize;

use crate::health::state::{HealthPolicy, HealthRecord, Transition};
use crate::load_balancer::ewma::Ewma;
use crate::resilience::{CircuitBreaker, CircuitPolicy, CircuitState};

/// Split `host:port`. Hosts may be names, IPv4 or bracketed IPv6.
pub fn parse_host_port(address: &str) -> Option<(String, u16)> {
    let (host, port) = address.trim().rsplit_once(':')?;
    if host.is_empty() || host.contains('/') {
        return None;
    }
    let port = port.parse::<u16>().ok()?;
    Some((host.to_string(), port))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// What a caller supplies to register an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSpec {
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Defaults to 1 when absent.
    pub weight: Option<u32>,
    pub tags: Vec<String>,
}

impl InstanceSpec {
    /// Build a spec from a `host:port` address; `None` if it doesn't parse.
    pub fn new(id: impl Into<String>, address: &str) -> Option<Self> {
        let (host, port) = parse_host_port(address)?;
        Some(Self {
            id: id.into(),
            host,
            port,
            weight: None,
            tags: Vec::new(),
        })
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// A single backend instance.
#[derive(Debug)]
pub struct Instance {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub tags: Vec<String>,
    /// Static weight, always >= 1.
    pub weight: u32,
    /// Registration time, ms since epoch.
    pub registered_at: u64,
    /// Registration order; keeps iteration deterministic.
    pub(crate) seq: u64,

    connections: AtomicUsize,
    total_requests: AtomicU64,
    total_errors: AtomicU64,
    /// Every failure ever recorded, probe or request. Never reset.
    failure_count: AtomicU64,
    /// Every success ever recorded, probe or request.
    success_count: AtomicU64,
    avg_response_ms: Ewma,
    last_response_ms: AtomicU64,
    last_health_check: AtomicU64,

    /// Lock-free mirror of `health.healthy` for the selection hot path.
    healthy: AtomicBool,
    health: Mutex<HealthRecord>,
    circuit: CircuitBreaker,
}

impl Instance {
    pub fn new(spec: InstanceSpec, seq: u64, circuit: CircuitPolicy) -> Self {
        let circuit = CircuitBreaker::new(spec.id.clone(), circuit);
        Self {
            id: spec.id,
            host: spec.host,
            port: spec.port,
            tags: spec.tags,
            weight: spec.weight.unwrap_or(1).max(1),
            registered_at: now_millis(),
            seq,
            connections: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            avg_response_ms: Ewma::default(),
            last_response_ms: AtomicU64::new(0),
            last_health_check: AtomicU64::new(0),
            healthy: AtomicBool::new(true),
            health: Mutex::new(HealthRecord::default()),
            circuit,
        }
    }

    /// `host:port`, as used in request URIs.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True if registering `spec` would change nothing.
    pub fn matches(&self, spec: &InstanceSpec) -> bool {
        self.host == spec.host
            && self.port == spec.port
            && self.weight == spec.weight.unwrap_or(1).max(1)
            && self.tags == spec.tags
    }

    fn health(&self) -> MutexGuard<'_, HealthRecord> {
        self.health.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- Load ---

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Count one in-flight request until the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.connections.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            instance: self.clone(),
        }
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    /// Smoothed response time in milliseconds.
    pub fn avg_response_ms(&self) -> f64 {
        self.avg_response_ms.get()
    }

    pub fn last_response_ms(&self) -> u64 {
        self.last_response_ms.load(Ordering::Relaxed)
    }

    /// Record the outcome of a forwarded request that produced a response or failed.
    pub fn record_request(&self, elapsed: Duration, success: bool) {
        let ms = elapsed.as_millis() as u64;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.last_response_ms.store(ms, Ordering::Relaxed);
        self.avg_response_ms.observe(ms as f64);

        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
            self.circuit.record_success();
        } else {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
            self.circuit.record_failure();
        }
    }

    // --- Health ---

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.health().consecutive_failures
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.health().consecutive_successes
    }

    /// Last probe time, ms since epoch; `None` before the first probe.
    pub fn last_health_check(&self) -> Option<u64> {
        match self.last_health_check.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        }
    }

    /// Apply a probe result.
    pub fn record_probe(&self, ok: bool, policy: &HealthPolicy) -> Option<Transition> {
        let mut record = self.health();
        let transition = if ok {
            self.success_count.fetch_add(1, Ordering::Relaxed);
            record.on_success(policy)
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            record.on_failure(policy)
        };
        self.healthy.store(record.healthy, Ordering::Release);
        self.last_health_check.store(now_millis(), Ordering::Relaxed);
        transition
    }

    /// A forwarded request failed at the network level.
    pub fn record_network_failure(&self, policy: &HealthPolicy) -> Option<Transition> {
        let mut record = self.health();
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        let transition = record.on_failure(policy);
        self.healthy.store(record.healthy, Ordering::Release);
        transition
    }

    // --- Circuit ---

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    pub fn circuit_allows(&self) -> bool {
        self.circuit.allows_request()
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        let record = self.health().clone();
        InstanceSnapshot {
            id: self.id.clone(),
            address: self.authority(),
            tags: self.tags.clone(),
            weight: self.weight,
            healthy: record.healthy,
            circuit: self.circuit_state(),
            connections: self.connections(),
            total_requests: self.total_requests(),
            total_errors: self.total_errors(),
            avg_response_ms: self.avg_response_ms(),
            last_response_ms: self.last_response_ms(),
            failure_count: self.failure_count(),
            consecutive_failures: record.consecutive_failures,
            consecutive_successes: record.consecutive_successes,
            last_health_check: self.last_health_check(),
            registered_at: self.registered_at,
        }
    }
}

/// Read-only view of one instance for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct InstanceSnapshot {
    pub id: String,
    pub address: String,
    pub tags: Vec<String>,
    pub weight: u32,
    pub healthy: bool,
    pub circuit: CircuitState,
    pub connections: usize,
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_response_ms: f64,
    pub last_response_ms: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_health_check: Option<u64>,
    pub registered_at: u64,
}

/// A RAII guard that manages the open connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    instance: Arc<Instance>,
}

impl Deref for ConnectionGuard {
    type Target = Instance;
    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.instance.connections.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Instance fixture used across selector tests.
    pub(crate) fn instance(id: &str, seq: u64) -> Arc<Instance> {
        let spec = InstanceSpec::new(id, &format!("127.0.0.1:{}", 9000 + seq)).unwrap();
        Arc::new(Instance::new(spec, seq, CircuitPolicy::default()))
    }

    #[test]
    fn parses_addresses() {
        assert_eq!(parse_host_port("10.0.0.1:3000"), Some(("10.0.0.1".into(), 3000)));
        assert_eq!(parse_host_port("api.internal:80"), Some(("api.internal".into(), 80)));
        assert_eq!(parse_host_port("[::1]:8080"), Some(("[::1]".into(), 8080)));
        assert_eq!(parse_host_port("no-port"), None);
        assert_eq!(parse_host_port(":80"), None);
        assert_eq!(parse_host_port("host:99999"), None);
    }

    #[test]
    fn new_instance_defaults() {
        let i = instance("a", 0);
        assert_eq!(i.weight, 1);
        assert!(i.is_healthy());
        assert_eq!(i.circuit_state(), CircuitState::Closed);
        assert_eq!(i.connections(), 0);
        assert_eq!(i.last_health_check(), None);
    }

    #[test]
    fn guard_releases_connection_exactly_once() {
        let i = instance("a", 0);
        {
            let _g1 = i.acquire();
            let _g2 = i.acquire();
            assert_eq!(i.connections(), 2);
        }
        assert_eq!(i.connections(), 0);
    }

    #[test]
    fn probes_drive_health_and_timestamp() {
        let i = instance("a", 0);
        let policy = HealthPolicy::default();

        assert_eq!(i.record_probe(false, &policy), None);
        assert_eq!(i.record_probe(false, &policy), None);
        assert_eq!(i.record_probe(false, &policy), Some(Transition::BecameUnhealthy));
        assert!(!i.is_healthy());
        assert_eq!(i.failure_count(), 3);
        assert!(i.last_health_check().is_some());

        i.record_probe(true, &policy);
        assert!(!i.is_healthy());
        assert_eq!(i.record_probe(true, &policy), Some(Transition::BecameHealthy));
        assert!(i.is_healthy());
        assert_eq!(i.failure_count(), 3, "lifetime failures survive recovery");
    }

    #[test]
    fn request_outcomes_update_counters() {
        let i = instance("a", 0);
        i.record_request(Duration::from_millis(200), true);
        i.record_request(Duration::from_millis(400), false);

        assert_eq!(i.total_requests(), 2);
        assert_eq!(i.total_errors(), 1);
        assert_eq!(i.success_count(), 1);
        assert_eq!(i.last_response_ms(), 400);
        assert!((i.avg_response_ms() - 220.0).abs() < 1e-9);
    }

    #[test]
    fn served_traffic_does_not_mask_failing_probes() {
        let i = instance("a", 0);
        let policy = HealthPolicy::default();

        i.record_probe(false, &policy);
        i.record_probe(false, &policy);
        i.record_request(Duration::from_millis(5), true);
        assert_eq!(i.consecutive_failures(), 2);

        assert_eq!(i.record_probe(false, &policy), Some(Transition::BecameUnhealthy));
        assert!(!i.is_healthy());
    }
}
