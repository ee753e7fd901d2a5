//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every instance concurrently, each under its own timeout
//!     → Update state.rs
//!
//! Passive health checks (passive.rs):
//!     Forwarded request fails at the network level
//!     → Increment failure count
//!     → Update state.rs, flipping unhealthy at once if threshold reached
//!
//! State machine (state.rs):
//!     Healthy ←→ Unhealthy
//!     With thresholds to prevent flapping
//! ```
//!
//! # Design Decisions
//! - Active and passive checks are complementary
//! - State transitions require consecutive successes/failures
//! - Health state is per-instance, not per-pool
//! - Probe errors never escape the monitor

use crate::load_balancer::Instance;
use crate::observability::metrics;

pub mod active;
pub mod passive;
pub mod state;

pub use active::{CycleSummary, HealthMonitor, ProbeFailure};
pub use state::{HealthPolicy, Transition};

/// Log and count a transition. Called exactly once per transition.
pub(crate) fn report_transition(instance: &Instance, transition: Transition, source: &'static str) {
    match transition {
        Transition::BecameUnhealthy => tracing::warn!(
            instance = %instance.id,
            address = %instance.authority(),
            consecutive_failures = instance.consecutive_failures(),
            source,
            "ALERT: instance marked unhealthy"
        ),
        Transition::BecameHealthy => tracing::info!(
            instance = %instance.id,
            consecutive_successes = instance.consecutive_successes(),
            source,
            "Instance recovered"
        ),
    }
    metrics::record_health_transition(&instance.id, transition.as_str());
}
