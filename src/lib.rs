//! Traffic director: an in-process request load balancer.
//!
//! Keeps a registry of backend instances, health-checks them, picks one per
//! request under a configurable algorithm, proxies with timeout and failover,
//! keeps session affinity, and derives scaling recommendations from live load.

pub mod config;
pub mod http;
pub mod health;
pub mod load_balancer;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod resilience;
pub mod scaling;
pub mod session;
pub mod store;
pub mod admin;

pub use config::schema::LbConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
