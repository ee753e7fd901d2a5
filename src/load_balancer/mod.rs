//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Request arrives (no valid sticky session)
//!     → registry.rs (healthy instances, registration order)
//!     → engine.rs (drop open circuits and the excluded failover instance)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through instances)
//!         - least_conn.rs (fewest open connections)
//!         - least_time.rs (lowest smoothed response time)
//!         - weighted.rs (cumulative-weight sampling)
//!         - health_score.rs (highest health score, default)
//!     → instance.rs (connection guard held for the request)
//! ```
//!
//! # Design Decisions
//! - Algorithms are stateless over instance state; the registry owns it
//! - Unhealthy instances are never candidates, whatever the algorithm
//! - Iteration order is registration order so ties are deterministic

use std::fmt::Debug;
use std::sync::Arc;

pub mod engine;
pub mod ewma;
pub mod health_score;
pub mod instance;
pub mod least_conn;
pub mod least_time;
pub mod registry;
pub mod round_robin;
pub mod weighted;

pub use engine::{SelectError, SelectionEngine};
pub use instance::{ConnectionGuard, Instance, InstanceSnapshot, InstanceSpec};
pub use registry::{Registry, RegistryError};

use crate::config::Algorithm;

/// A selection algorithm over an already-filtered candidate list.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Pick one candidate; `None` only when `instances` is empty.
    fn next_server(&self, instances: &[Arc<Instance>]) -> Option<Arc<Instance>>;

    fn name(&self) -> &'static str;
}

/// Build the selector for `algorithm`. `seed` only affects the weighted selector.
pub fn create_load_balancer(algorithm: Algorithm, seed: Option<u64>) -> Box<dyn LoadBalancer> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        Algorithm::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        Algorithm::LeastResponseTime => Box::new(least_time::LeastResponseTime::new()),
        Algorithm::WeightedRoundRobin => Box::new(weighted::WeightedRoundRobin::new(seed)),
        Algorithm::HealthBased => Box::new(health_score::HealthBased::new()),
    }
}
