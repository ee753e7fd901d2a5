use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::status::StatusSnapshot;
use crate::http::AppState;
use crate::load_balancer::{InstanceSnapshot, InstanceSpec};
use crate::scaling::Recommendation;

/// Body of `POST /admin/instances`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Defaults to the address.
    pub id: Option<String>,
    pub address: String,
    pub weight: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(StatusSnapshot::capture(&state))
}

pub async fn list_instances(State(state): State<AppState>) -> Json<Vec<InstanceSnapshot>> {
    Json(state.registry.all_instances().iter().map(|i| i.snapshot()).collect())
}

pub async fn register_instance(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Response {
    if body.weight == Some(0) {
        return (StatusCode::BAD_REQUEST, "weight must be positive").into_response();
    }

    let id = body.id.unwrap_or_else(|| body.address.clone());
    let Some(mut spec) = InstanceSpec::new(id, &body.address) else {
        return (StatusCode::BAD_REQUEST, format!("invalid address '{}'", body.address)).into_response();
    };
    spec.weight = body.weight;
    spec.tags = body.tags;

    let instance = state.registry.register(spec).await;
    (StatusCode::CREATED, Json(instance.snapshot())).into_response()
}

pub async fn unregister_instance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.registry.unregister(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn get_recommendations(State(state): State<AppState>) -> Json<Vec<Recommendation>> {
    Json(state.advisor.recommendations())
}

#[derive(Debug, Serialize)]
pub struct FlushedSessions {
    pub removed: usize,
}

/// Forget every sticky mapping, e.g. after draining an instance by hand.
pub async fn flush_sessions(State(state): State<AppState>) -> Json<FlushedSessions> {
    let removed = state.sessions.clear().await;
    tracing::info!(removed, "Flushed sticky sessions");
    Json(FlushedSessions { removed })
}
