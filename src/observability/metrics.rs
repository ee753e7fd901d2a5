//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Name every series the balancer emits, in one place
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `lb_requests_total` (counter): forwarded requests by method, status, instance
//! - `lb_request_duration_seconds` (histogram): end-to-end latency
//! - `lb_failovers_total` (counter): retries on a second instance
//! - `lb_instance_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `lb_instance_connections` (gauge): in-flight requests per instance
//! - `lb_health_transitions_total` (counter): health flips by direction
//! - `lb_store_errors_total` (counter): failed store operations by kind
//! - `lb_registered_instances` (gauge): registry size

use std::net::SocketAddr;
use std::time::Instant;
use metrics::{counter, gauge, histogram, Label};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP listener. Needs a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, instance: &str, start: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("instance", instance.to_string()),
    ];
    counter!("lb_requests_total", labels.clone()).increment(1);
    histogram!("lb_request_duration_seconds", labels).record(start.elapsed().as_secs_f64());
}

pub fn record_failover(from: &str) {
    counter!("lb_failovers_total", "from" => from.to_string()).increment(1);
}

pub fn record_instance_health(instance: &str, healthy: bool) {
    gauge!("lb_instance_healthy", "instance" => instance.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_instance_connections(instance: &str, connections: usize) {
    gauge!("lb_instance_connections", "instance" => instance.to_string()).set(connections as f64);
}

pub fn record_health_transition(instance: &str, to: &'static str) {
    counter!(
        "lb_health_transitions_total",
        "instance" => instance.to_string(),
        "to" => to
    )
    .increment(1);
}

pub fn record_store_error(op: &'static str) {
    counter!("lb_store_errors_total", "op" => op).increment(1);
}

pub fn record_registered(count: usize) {
    gauge!("lb_registered_instances").set(count as f64);
}
