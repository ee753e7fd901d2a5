use std::time::Duration;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::load_balancer::SelectError;

/// Why a request could not be served. Carries the underlying cause so callers
/// can tell a timeout from a refused connection from missing capacity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProxyError {
    #[error("no healthy instances available")]
    NoHealthyInstances,

    #[error("instance {instance} timed out after {after:?}")]
    Timeout { instance: String, after: Duration },

    #[error("failed to connect to instance {instance}: {reason}")]
    Connect { instance: String, reason: String },

    #[error("transport error from instance {instance}: {reason}")]
    Transport { instance: String, reason: String },

    #[error("response from instance {instance} exceeds {limit} bytes")]
    ResponseTooLarge { instance: String, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    /// Network-level failures are the ones that trigger health escalation and failover.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ProxyError::Timeout { .. } | ProxyError::Connect { .. } | ProxyError::Transport { .. }
        )
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoHealthyInstances => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Connect { .. }
            | ProxyError::Transport { .. }
            | ProxyError::ResponseTooLarge { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<SelectError> for ProxyError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::NoHealthyInstances => ProxyError::NoHealthyInstances,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
