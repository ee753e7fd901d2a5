//! Metrics aggregation and scaling advice.
//!
//! # Data Flow
//! ```text
//! Every proxied request
//!     → global.rs (totals, smoothed latency, per-second buckets)
//!
//! On demand (admin status, recommendations)
//!     → advisor.rs reads registry + global metrics
//!     → structured recommendations, never acted upon here
//! ```

pub mod advisor;
pub mod global;

pub use advisor::{evaluate, LoadSnapshot, Priority, Recommendation, ScalingAction, ScalingAdvisor};
pub use global::{GlobalMetrics, GlobalSnapshot};
