//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + LB_INSTANCES / LB_ALGORITHM
//!     → loader.rs (parse, environment overrides)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, immutable)
//!     → handed to lifecycle::startup, which builds every subsystem
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server reconciles configured instances and swaps the algorithm
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{finalize, load_config, ConfigError, CONFIGURED_TAG, EXTERNAL_TAG};
pub use schema::*;
