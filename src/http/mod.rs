//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → buffer body (bounded by listener.request_body_limit)
//!     → proxy::RequestProxy (sticky / select / forward / failover)
//!     → response relayed with the instance's status, headers, body
//! ```

pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
