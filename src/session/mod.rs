//! Session affinity.
//!
//! ```text
//! request with session key
//!     → sticky.rs get(key)     → mapped instance, if still healthy
//!     → otherwise fresh selection, written back with set(key, id)
//! ```

pub mod sticky;

pub use sticky::{StickySessions, SESSION_PREFIX};
