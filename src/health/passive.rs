//! Passive health checking (failure detection on live traffic).
//!
//! # Responsibilities
//! - Observe network-level failures of forwarded requests
//! - Escalate health immediately, without waiting for the next probe cycle
//!
//! # Design Decisions
//! - Only connection errors and timeouts count; a 5xx is an answer, not an outage
//! - Shares the probe state machine and thresholds
//! - Recovery is always left to probes

use crate::health::{report_transition, state::HealthPolicy};
use crate::load_balancer::Instance;

/// Record a network failure against `instance`. Returns whether it is still healthy.
pub fn record_network_failure(instance: &Instance, policy: &HealthPolicy) -> bool {
    if let Some(transition) = instance.record_network_failure(policy) {
        report_transition(instance, transition, "request");
    }
    instance.is_healthy()
}
