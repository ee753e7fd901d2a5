//! Configuration loading from disk and environment.

use std::path::Path;
use std::fs;
use crate::config::schema::{InstanceConfig, LbConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Comma-separated `host:port` list of extra instances.
pub const ENV_INSTANCES: &str = "LB_INSTANCES";
/// Selection algorithm override.
pub const ENV_ALGORITHM: &str = "LB_ALGORITHM";

/// Tag applied to instances discovered through the environment.
pub const EXTERNAL_TAG: &str = "external";
/// Tag applied to instances listed in the config file.
pub const CONFIGURED_TAG: &str = "configured";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment value {name}: {reason}")]
    Env { name: &'static str, reason: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file, applying environment overrides.
pub fn load_config(path: &Path) -> Result<LbConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: LbConfig = toml::from_str(&content)?;
    finalize(config, |name| std::env::var(name).ok())
}

/// Apply environment overrides and validate.
///
/// `env` is injected so tests don't have to touch the process environment.
pub fn finalize<F>(mut config: LbConfig, env: F) -> Result<LbConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    for instance in config.instances.iter_mut() {
        if !instance.tags.iter().any(|t| t == CONFIGURED_TAG) {
            instance.tags.push(CONFIGURED_TAG.to_string());
        }
    }

    if let Some(list) = env(ENV_INSTANCES) {
        config.instances.extend(parse_instance_list(&list));
    }

    if let Some(algorithm) = env(ENV_ALGORITHM) {
        config.balancer.algorithm = algorithm.parse().map_err(|reason| ConfigError::Env {
            name: ENV_ALGORITHM,
            reason,
        })?;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse `host:port,host:port` into external instance entries.
pub fn parse_instance_list(list: &str) -> Vec<InstanceConfig> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| InstanceConfig::tagged(entry, EXTERNAL_TAG))
        .collect()
}
