//! Scaling advisor.
//!
//! Derives capacity recommendations from live registry state and global
//! latency. Output is advisory only; nothing here adds or removes instances.

use std::sync::Arc;
use serde::Serialize;

use crate::config::ScalingConfig;
use crate::load_balancer::Registry;
use crate::scaling::GlobalMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub action: ScalingAction,
    pub priority: Priority,
    pub reason: String,
    pub observed: f64,
    pub threshold: f64,
}

/// The inputs the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoadSnapshot {
    pub registered: usize,
    pub healthy: usize,
    pub total_connections: usize,
    pub avg_response_ms: f64,
}

/// Apply the scaling rules to one snapshot. Ordered by priority.
pub fn evaluate(config: &ScalingConfig, load: &LoadSnapshot) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if load.registered > 0 && load.healthy == 0 {
        out.push(Recommendation {
            action: ScalingAction::ScaleUp,
            priority: Priority::High,
            reason: "no healthy instances".to_string(),
            observed: 0.0,
            threshold: 1.0,
        });
    } else if load.healthy > 0 {
        let per_healthy = load.total_connections as f64 / load.healthy as f64;
        if per_healthy > config.high_connections {
            out.push(Recommendation {
                action: ScalingAction::ScaleUp,
                priority: Priority::High,
                reason: format!("average connections per healthy instance is {:.1}", per_healthy),
                observed: per_healthy,
                threshold: config.high_connections,
            });
        }
    }

    if load.avg_response_ms > config.high_response_time_ms {
        out.push(Recommendation {
            action: ScalingAction::ScaleUp,
            priority: Priority::Medium,
            reason: format!("average response time is {:.0}ms", load.avg_response_ms),
            observed: load.avg_response_ms,
            threshold: config.high_response_time_ms,
        });
    }

    if load.registered > config.min_instances {
        let per_instance = load.total_connections as f64 / load.registered as f64;
        if per_instance < config.low_connections {
            out.push(Recommendation {
                action: ScalingAction::ScaleDown,
                priority: Priority::Low,
                reason: format!(
                    "average connections per instance is {:.1} across {} instances",
                    per_instance, load.registered
                ),
                observed: per_instance,
                threshold: config.low_connections,
            });
        }
    }

    out
}

#[derive(Debug, Clone)]
pub struct ScalingAdvisor {
    registry: Arc<Registry>,
    global: Arc<GlobalMetrics>,
    config: ScalingConfig,
}

impl ScalingAdvisor {
    pub fn new(registry: Arc<Registry>, global: Arc<GlobalMetrics>, config: ScalingConfig) -> Self {
        Self { registry, global, config }
    }

    pub fn load(&self) -> LoadSnapshot {
        LoadSnapshot {
            registered: self.registry.len(),
            healthy: self.registry.healthy_instances().len(),
            total_connections: self.registry.total_connections(),
            avg_response_ms: self.global.avg_response_ms(),
        }
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        evaluate(&self.config, &self.load())
    }
}
