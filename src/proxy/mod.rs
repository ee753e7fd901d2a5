//! Request proxying with failover.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (request.rs)
//!     → forward.rs resolve: sticky session, else selection engine
//!     → hold a connection guard on the target
//!     → forward with forwarding headers, under the request timeout
//!     → record instance + global metrics (success = status < 500)
//!     → on a network failure: passive health escalation, then one failover
//!       attempt on a different instance
//!     → ProxyResponse, or the original error (error.rs)
//! ```
//!
//! # Design Decisions
//! - 4xx/5xx are normal outcomes; only timeouts and transport errors fail over
//! - Failover never consults sticky sessions and never writes them
//! - Bodies are fully buffered so the failover attempt can resend them

pub mod error;
pub mod forward;
pub mod request;

pub use error::ProxyError;
pub use forward::{ProxySettings, RequestProxy};
pub use request::{ProxyRequest, ProxyResponse};

/// Header carrying the originating client address chain.
pub const FORWARDED_FOR: &str = "x-forwarded-for";
/// Header identifying the balancer that forwarded the request.
pub const LOAD_BALANCER: &str = "x-load-balancer";
/// Header identifying the instance chosen for the request.
pub const TARGET_INSTANCE: &str = "x-target-instance";
