//! Read-only snapshot of the whole balancer.

use serde::Serialize;

use crate::http::AppState;
use crate::load_balancer::InstanceSnapshot;
use crate::scaling::{GlobalSnapshot, Recommendation};

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub version: &'static str,
    pub lb_id: String,
    pub algorithm: &'static str,
    pub registered: usize,
    pub healthy: usize,
    pub total_connections: usize,
    pub instances: Vec<InstanceSnapshot>,
    pub global: GlobalSnapshot,
    pub recommendations: Vec<Recommendation>,
}

impl StatusSnapshot {
    pub fn capture(state: &AppState) -> Self {
        let instances: Vec<InstanceSnapshot> = state
            .registry
            .all_instances()
            .iter()
            .map(|i| i.snapshot())
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION"),
            lb_id: state.proxy.lb_id().to_string(),
            algorithm: state.engine.algorithm().as_str(),
            registered: instances.len(),
            healthy: instances.iter().filter(|i| i.healthy).count(),
            total_connections: instances.iter().map(|i| i.connections).sum(),
            instances,
            global: state.global.snapshot(),
            recommendations: state.advisor.recommendations(),
        }
    }
}
