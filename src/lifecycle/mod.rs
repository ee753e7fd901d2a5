//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → store → discovery → registry
//!     → self/configured/external registrations → engine → proxy → listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → stop health cycles and janitor → stop accepting
//!     → drain in-flight requests (bounded) → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - No global singletons; everything is composed here and injected
//! - Drain has a deadline: remaining connections are abandoned after it

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{drain, Shutdown};
pub use startup::bootstrap;
