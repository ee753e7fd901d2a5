//! Circuit breaker for instance protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: instance assumed down, excluded from selection
//! - Half-Open: the open period elapsed, traffic is admitted again
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive request failures >= failure_threshold
//! Open → Half-Open: after the open period
//! Half-Open → Closed: a request succeeds
//! Half-Open → Open: a request fails
//! ```
//!
//! Driven only by forwarded request outcomes. Probe results never touch it;
//! they drive health state instead.

use std::sync::Mutex;
use std::time::Duration;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitPolicy {
    pub failure_threshold: u32,
    pub open_for: Duration,
}

impl Default for CircuitPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
        }
    }
}

impl From<&CircuitBreakerConfig> for CircuitPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            open_for: Duration::from_secs(config.open_secs),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    instance: String,
    policy: CircuitPolicy,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// A closed breaker guarding `instance`.
    pub fn new(instance: impl Into<String>, policy: CircuitPolicy) -> Self {
        Self {
            instance: instance.into(),
            policy,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Whether the instance may receive traffic. Moves an expired open circuit to half-open.
    pub fn allows_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = inner
                    .opened_at
                    .map(|at| at.elapsed() >= self.policy.open_for)
                    .unwrap_or(true);
                if expired {
                    inner.state = CircuitState::HalfOpen;
                    tracing::info!(instance = %self.instance, "Circuit breaker transitioned to half-open");
                }
                expired
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.failures = 0;
        if inner.state != CircuitState::Closed {
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            tracing::info!(instance = %self.instance, "Circuit breaker closed after successful request");
        }
    }

    /// Returns true when this failure opened the circuit.
    pub fn record_failure(&self) -> bool {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);

        let should_open = match inner.state {
            CircuitState::Closed => inner.failures >= self.policy.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                false
            }
        };

        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            tracing::warn!(instance = %self.instance, failures = inner.failures, "Circuit breaker opened");
        }
        should_open
    }
}
