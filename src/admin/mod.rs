//! Admin surface: inspection and runtime registration, behind a bearer token.

pub mod auth;
pub mod handlers;
pub mod status;

use axum::{
    routing::get,
    Router,
    middleware,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::AppState;
use self::auth::admin_auth_middleware;
use self::handlers::*;

pub use status::StatusSnapshot;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/instances", get(list_instances).post(register_instance))
        .route("/admin/instances/{id}", axum::routing::delete(unregister_instance))
        .route("/admin/recommendations", get(get_recommendations))
        .route("/admin/sessions", axum::routing::delete(flush_sessions))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin server starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
