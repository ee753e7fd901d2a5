//! Instance health state machine.
//!
//! # States
//! - Healthy: instance receives traffic
//! - Unhealthy: instance excluded from every selection algorithm
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= max_failures
//! Unhealthy → Healthy: consecutive successes >= recovery_requests
//! ```
//!
//! Every probe outcome resets the opposite streak. Transitions are reported once,
//! at the moment they happen, so callers can alert exactly once.

use crate::config::HealthCheckConfig;

/// Thresholds driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub max_failures: u32,
    pub recovery_requests: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            max_failures: 3,
            recovery_requests: 2,
        }
    }
}

impl From<&HealthCheckConfig> for HealthPolicy {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            max_failures: config.max_failures,
            recovery_requests: config.recovery_requests,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BecameUnhealthy,
    BecameHealthy,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::BecameUnhealthy => "unhealthy",
            Transition::BecameHealthy => "healthy",
        }
    }
}

/// Per-instance health bookkeeping. Guarded by the instance's own lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthRecord {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }
}

impl HealthRecord {
    /// A probe failed, or a forwarded request failed at the network level.
    pub fn on_failure(&mut self, policy: &HealthPolicy) -> Option<Transition> {
        self.consecutive_successes = 0;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.healthy && self.consecutive_failures >= policy.max_failures {
            self.healthy = false;
            return Some(Transition::BecameUnhealthy);
        }
        None
    }

    /// A probe succeeded.
    pub fn on_success(&mut self, policy: &HealthPolicy) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);

        if !self.healthy && self.consecutive_successes >= policy.recovery_requests {
            self.healthy = true;
            return Some(Transition::BecameHealthy);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhealthy_after_max_failures_and_alerts_once() {
        let policy = HealthPolicy::default();
        let mut record = HealthRecord::default();

        assert_eq!(record.on_failure(&policy), None);
        assert_eq!(record.on_failure(&policy), None);
        assert_eq!(record.on_failure(&policy), Some(Transition::BecameUnhealthy));
        assert!(!record.healthy);

        // Further failures do not report again.
        assert_eq!(record.on_failure(&policy), None);
        assert_eq!(record.consecutive_failures, 4);
    }

    #[test]
    fn recovery_needs_full_success_streak() {
        let policy = HealthPolicy::default();
        let mut record = HealthRecord {
            healthy: false,
            consecutive_failures: 3,
            consecutive_successes: 0,
        };

        assert_eq!(record.on_success(&policy), None);
        assert!(!record.healthy, "one of two successes must not restore");
        assert_eq!(record.consecutive_failures, 0);

        assert_eq!(record.on_success(&policy), Some(Transition::BecameHealthy));
        assert!(record.healthy);
    }

    #[test]
    fn failure_breaks_recovery_streak() {
        let policy = HealthPolicy::default();
        let mut record = HealthRecord {
            healthy: false,
            consecutive_failures: 0,
            consecutive_successes: 0,
        };

        record.on_success(&policy);
        record.on_failure(&policy);
        assert_eq!(record.consecutive_successes, 0);
        assert_eq!(record.on_success(&policy), None);
        assert!(!record.healthy);
    }

    #[test]
    fn only_a_probe_success_breaks_the_failure_streak() {
        let policy = HealthPolicy::default();
        let mut record = HealthRecord::default();

        record.on_failure(&policy);
        record.on_failure(&policy);
        record.on_success(&policy);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.on_failure(&policy), None);
        assert!(record.healthy);
    }
}
