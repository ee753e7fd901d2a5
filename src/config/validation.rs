//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, weights > 0, addresses parse)
//! - Detect duplicate instance ids and self-proxy loops
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::LbConfig;
use crate::load_balancer::instance::parse_host_port;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid address '{address}' for {field}")]
    InvalidAddress { field: String, address: String },

    #[error("instance '{0}' has zero weight")]
    ZeroWeight(String),

    #[error("duplicate instance id '{0}'")]
    DuplicateInstance(String),

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("self instance address {0} is the balancer listener")]
    SelfLoop(String),
}

pub fn validate_config(config: &LbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener: Option<SocketAddr> = match config.listener.bind_address.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field: "listener.bind_address".into(),
                address: config.listener.bind_address.clone(),
            });
            None
        }
    };

    let mut ids = HashSet::new();

    if config.self_instance.enabled {
        let own = &config.self_instance;
        if parse_host_port(&own.address).is_none() {
            errors.push(ValidationError::InvalidAddress {
                field: "self_instance.address".into(),
                address: own.address.clone(),
            });
        }
        if own.weight == 0 {
            errors.push(ValidationError::ZeroWeight(own.id.clone()));
        }
        if let (Some(listener), Ok(own_addr)) = (listener, own.address.parse::<SocketAddr>()) {
            let same_port = listener.port() == own_addr.port();
            if same_port && (listener.ip() == own_addr.ip() || listener.ip().is_unspecified()) {
                errors.push(ValidationError::SelfLoop(own.address.clone()));
            }
        }
        ids.insert(own.id.clone());
    }

    for instance in &config.instances {
        let id = instance.resolved_id();
        if parse_host_port(&instance.address).is_none() {
            errors.push(ValidationError::InvalidAddress {
                field: format!("instances[{}].address", id),
                address: instance.address.clone(),
            });
        }
        if instance.weight == 0 {
            errors.push(ValidationError::ZeroWeight(id.clone()));
        }
        if !ids.insert(id.clone()) {
            errors.push(ValidationError::DuplicateInstance(id));
        }
    }

    let positives: [(&'static str, u64); 8] = [
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("health_check.max_failures", config.health_check.max_failures as u64),
        ("health_check.recovery_requests", config.health_check.recovery_requests as u64),
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("sessions.ttl_secs", config.sessions.ttl_secs),
        ("circuit_breaker.failure_threshold", config.circuit_breaker.failure_threshold as u64),
        ("shutdown.poll_interval_ms", config.shutdown.poll_interval_ms),
    ];
    for (field, value) in positives {
        if value == 0 {
            errors.push(ValidationError::MustBePositive(field));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::InstanceConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&LbConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = LbConfig::default();
        config.instances.push(InstanceConfig::tagged("not-an-address", "configured"));
        config.instances.push(InstanceConfig {
            id: Some("self".into()),
            address: "10.0.0.2:3000".into(),
            weight: 0,
            tags: vec![],
        });
        config.health_check.max_failures = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidAddress { .. })));
        assert!(errors.contains(&ValidationError::ZeroWeight("self".into())));
        assert!(errors.contains(&ValidationError::DuplicateInstance("self".into())));
        assert!(errors.contains(&ValidationError::MustBePositive("health_check.max_failures")));
    }

    #[test]
    fn rejects_self_instance_on_listener_port() {
        let mut config = LbConfig::default();
        config.self_instance.address = "127.0.0.1:8080".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::SelfLoop("127.0.0.1:8080".into())]);
    }
}
