//! Forwarding, accounting, and failover.

use std::sync::Arc;
use std::time::{Duration, Instant};
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};

use crate::health::{passive, HealthPolicy};
use crate::load_balancer::{Instance, Registry, SelectionEngine};
use crate::observability::metrics;
use crate::proxy::{ProxyError, ProxyRequest, ProxyResponse, FORWARDED_FOR, LOAD_BALANCER, TARGET_INSTANCE};
use crate::resilience::with_timeout;
use crate::scaling::GlobalMetrics;
use crate::session::StickySessions;

/// Connection-scoped headers that must not be relayed from the instance.
const HOP_BY_HOP: [HeaderName; 4] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::CONTENT_LENGTH,
    HeaderName::from_static("keep-alive"),
];

#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Identity sent in the load balancer header.
    pub lb_id: String,
    pub request_timeout: Duration,
    /// Largest instance response body that will be buffered.
    pub response_body_limit: usize,
    pub health: HealthPolicy,
}

pub struct RequestProxy {
    registry: Arc<Registry>,
    engine: Arc<SelectionEngine>,
    sessions: StickySessions,
    global: Arc<GlobalMetrics>,
    client: Client<HttpConnector, Body>,
    settings: ProxySettings,
}

impl RequestProxy {
    pub fn new(
        registry: Arc<Registry>,
        engine: Arc<SelectionEngine>,
        sessions: StickySessions,
        global: Arc<GlobalMetrics>,
        settings: ProxySettings,
    ) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            registry,
            engine,
            sessions,
            global,
            client,
            settings,
        }
    }

    pub fn lb_id(&self) -> &str {
        &self.settings.lb_id
    }

    /// Forward `request` to one instance, failing over once on a network error.
    /// Any status code is a normal outcome.
    pub async fn proxy(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let (target, sticky) = self.resolve(&request).await?;

        match self.attempt(&target, &request).await {
            Ok(response) => {
                if !sticky {
                    if let Some(key) = &request.session_key {
                        self.sessions.set(key, &target.id).await;
                    }
                }
                Ok(response)
            }
            Err(err) if err.is_network() => self.fail_over(&target, &request, err).await,
            Err(err) => Err(err),
        }
    }

    /// Sticky mapping first, then a fresh selection. The flag reports stickiness.
    async fn resolve(&self, request: &ProxyRequest) -> Result<(Arc<Instance>, bool), ProxyError> {
        if let Some(key) = &request.session_key {
            if let Some(instance) = self.sessions.get(key, &self.registry).await {
                if instance.circuit_allows() {
                    tracing::debug!(session = %key, instance = %instance.id, "Using sticky instance");
                    return Ok((instance, true));
                }
            }
        }
        Ok((self.engine.select(None)?, false))
    }

    /// One retry on a different instance. If that is impossible or also fails,
    /// the caller gets the first error.
    async fn fail_over(
        &self,
        failed: &Instance,
        request: &ProxyRequest,
        original: ProxyError,
    ) -> Result<ProxyResponse, ProxyError> {
        passive::record_network_failure(failed, &self.settings.health);

        let next = match self.engine.select(Some(&failed.id)) {
            Ok(next) => next,
            Err(_) => {
                tracing::warn!(instance = %failed.id, error = %original, "Request failed and no failover instance is available");
                return Err(original);
            }
        };

        metrics::record_failover(&failed.id);
        tracing::info!(from = %failed.id, to = %next.id, error = %original, "Failing over");

        match self.attempt(&next, request).await {
            Ok(response) => Ok(response),
            Err(second) => {
                if second.is_network() {
                    passive::record_network_failure(&next, &self.settings.health);
                }
                tracing::warn!(
                    instance = %next.id,
                    error = %second,
                    original = %original,
                    "Failover attempt failed"
                );
                Err(original)
            }
        }
    }

    /// A single exchange with `target`, holding a connection slot throughout.
    async fn attempt(&self, target: &Arc<Instance>, request: &ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        let guard = target.acquire();
        metrics::record_instance_connections(&target.id, guard.connections());

        let outbound = self.build_request(target, request)?;
        let started = Instant::now();
        let limit = self.settings.response_body_limit;
        let result = with_timeout(self.settings.request_timeout, async {
            let response: Response<Incoming> = self.client.request(outbound).await.map_err(|e| {
                if e.is_connect() {
                    ProxyError::Connect { instance: target.id.clone(), reason: e.to_string() }
                } else {
                    ProxyError::Transport { instance: target.id.clone(), reason: e.to_string() }
                }
            })?;
            let (parts, body) = response.into_parts();
            let body = Limited::new(body, limit)
                .collect()
                .await
                .map_err(|e| {
                    if e.is::<LengthLimitError>() {
                        ProxyError::ResponseTooLarge { instance: target.id.clone(), limit }
                    } else {
                        ProxyError::Transport { instance: target.id.clone(), reason: e.to_string() }
                    }
                })?
                .to_bytes();
            Ok::<_, ProxyError>((parts, body))
        })
        .await
        .unwrap_or_else(|elapsed| {
            Err(ProxyError::Timeout { instance: target.id.clone(), after: elapsed.0 })
        });
        let elapsed = started.elapsed();

        drop(guard);
        metrics::record_instance_connections(&target.id, target.connections());

        match result {
            Ok((parts, body)) => {
                let success = parts.status.as_u16() < 500;
                target.record_request(elapsed, success);
                self.global.record(elapsed, success);
                metrics::record_request(request.method.as_str(), parts.status.as_u16(), &target.id, started);

                let mut headers = parts.headers;
                for name in HOP_BY_HOP.iter() {
                    headers.remove(name);
                }

                Ok(ProxyResponse {
                    status: parts.status,
                    headers,
                    body,
                    response_time_ms: elapsed.as_millis() as u64,
                    instance_id: target.id.clone(),
                })
            }
            Err(err) => {
                tracing::debug!(instance = %target.id, error = %err, "Forwarding failed");
                target.record_request(elapsed, false);
                self.global.record(elapsed, false);
                metrics::record_request(request.method.as_str(), err.status().as_u16(), &target.id, started);
                Err(err)
            }
        }
    }

    fn build_request(&self, target: &Instance, request: &ProxyRequest) -> Result<Request<Body>, ProxyError> {
        let uri = format!("http://{}{}", target.authority(), request.path_and_query())
            .parse::<Uri>()
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        let mut headers = request.headers.clone();
        headers.remove(header::CONNECTION);
        self.add_forwarding_headers(&mut headers, target, request)?;

        let mut outbound = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .body(Body::from(request.body.clone()))
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    fn add_forwarding_headers(
        &self,
        headers: &mut HeaderMap,
        target: &Instance,
        request: &ProxyRequest,
    ) -> Result<(), ProxyError> {
        if let Some(client) = request.client_addr {
            let chain = match headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{}, {}", existing, client.ip()),
                None => client.ip().to_string(),
            };
            headers.insert(FORWARDED_FOR, header_value(&chain)?);
        }
        headers.insert(LOAD_BALANCER, header_value(&self.settings.lb_id)?);
        headers.insert(TARGET_INSTANCE, header_value(&target.id)?);
        Ok(())
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ProxyError> {
    HeaderValue::from_str(value).map_err(|e| ProxyError::InvalidRequest(e.to_string()))
}

impl std::fmt::Debug for RequestProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProxy")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
