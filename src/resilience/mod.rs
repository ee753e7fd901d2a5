//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to instance:
//!     → timeouts.rs (hard deadline on probe / forwarded request)
//!     → circuit_breaker.rs (track request failures, open circuit if threshold exceeded)
//!     → on network failure: proxy fails over exactly once
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No backoff between the first attempt and the failover attempt
//! - Circuit breaker is per instance, never global

pub mod circuit_breaker;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitPolicy, CircuitState};
pub use timeouts::{with_timeout, Elapsed};
