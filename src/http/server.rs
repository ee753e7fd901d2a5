//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy fallback handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener
//! - Run the background tasks: health monitor, config reconciliation, store janitor
//! - Coordinate shutdown: stop cycles, stop accepting, drain

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{LbConfig, CONFIGURED_TAG, EXTERNAL_TAG};
use crate::health::HealthMonitor;
use crate::lifecycle::{drain, Shutdown};
use crate::load_balancer::{Registry, SelectionEngine};
use crate::observability::metrics;
use crate::proxy::{ProxyError, ProxyRequest, RequestProxy};
use crate::scaling::{GlobalMetrics, ScalingAdvisor};
use crate::session::StickySessions;
use crate::store::MemoryStore;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// How often expired store entries are purged.
const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub engine: Arc<SelectionEngine>,
    pub proxy: Arc<RequestProxy>,
    pub global: Arc<GlobalMetrics>,
    pub advisor: Arc<ScalingAdvisor>,
    pub sessions: StickySessions,
    pub store: MemoryStore,
    pub session_header: String,
    pub body_limit: usize,
    pub admin_key: String,
}

/// HTTP server for the balancer's data plane.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: LbConfig,
}

impl HttpServer {
    pub fn new(state: AppState, config: LbConfig) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Run until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<LbConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let internal = Shutdown::new();

        let monitor = HealthMonitor::new(self.state.registry.clone(), self.config.health_check.clone());
        let monitor_task = tokio::spawn(monitor.run(internal.subscribe()));
        let janitor_task = self.state.store.spawn_janitor(JANITOR_INTERVAL, internal.subscribe());
        let reload_task = tokio::spawn(reconcile(self.state.clone(), config_updates, internal.subscribe()));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let mut stop_accepting = internal.subscribe();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_accepting.recv().await;
                })
                .await
        });

        tokio::select! {
            joined = &mut server => {
                internal.trigger();
                tracing::error!("HTTP server stopped unexpectedly");
                return joined.map_err(std::io::Error::other)?;
            }
            _ = shutdown.recv() => {}
        }

        tracing::info!("Shutdown requested, stopping background tasks and listener");
        internal.trigger();
        for task in [monitor_task, janitor_task, reload_task] {
            let _ = task.await;
        }

        let drained = drain(
            &self.state.registry,
            Duration::from_secs(self.config.shutdown.drain_timeout_secs),
            Duration::from_millis(self.config.shutdown.poll_interval_ms),
        )
        .await;

        // Connections still open after the drain bound are abandoned.
        match tokio::time::timeout(Duration::from_secs(1), &mut server).await {
            Ok(joined) => joined.map_err(std::io::Error::other)??,
            Err(_) => {
                tracing::warn!(drained, "Closing listener with connections still open");
                server.abort();
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &LbConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Apply reloaded configs until shutdown.
async fn reconcile(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<LbConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(config) => apply_config(&state, &config).await,
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Reconcile config-sourced instances and the algorithm. Runtime registrations stay.
pub async fn apply_config(state: &AppState, config: &LbConfig) {
    for tag in [CONFIGURED_TAG, EXTERNAL_TAG] {
        state.registry.sync_tagged(tag, &config.instances).await;
    }
    state.engine.set_algorithm(config.balancer.algorithm);
    tracing::info!(
        instances = state.registry.len(),
        algorithm = config.balancer.algorithm.as_str(),
        "Applied configuration update"
    );
}

/// Main proxy handler: buffer, forward, relay.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let declared_len = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_len.is_some_and(|len| len > state.body_limit) {
        tracing::warn!(request_id = %request_id, limit = state.body_limit, "Request body too large");
        metrics::record_request(&method, 413, "none", start_time);
        return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
    }

    let body = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(&method, 400, "none", start_time);
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    let request = ProxyRequest::from_parts(
        parts.method,
        parts.uri,
        parts.headers,
        body,
        Some(client),
        &state.session_header,
    );

    tracing::debug!(
        request_id = %request_id,
        method = %request.method,
        path = %request.path_and_query(),
        session = ?request.session_key,
        "Proxying request"
    );

    match state.proxy.proxy(request).await {
        Ok(response) => {
            tracing::debug!(
                request_id = %request_id,
                instance = %response.instance_id,
                status = response.status.as_u16(),
                response_time_ms = response.response_time_ms,
                "Request served"
            );
            response.into_response()
        }
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Request failed");
            if e == ProxyError::NoHealthyInstances {
                metrics::record_request(&method, e.status().as_u16(), "none", start_time);
            }
            e.into_response()
        }
    }
}
