//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Parse each inbound request URL and select its route
//! - Apply inbound rewriting and forward to the rewritten backend URL
//! - Apply outbound rewriting to redirect Location headers
//! - Observability (metrics, request IDs)
//!
//! # Dispatch Flow
//! ```text
//! request path+query
//!     → Parser::parse_literal
//!     → Topology::select_route   (no route → 404)
//!     → RewriteEngine (inbound)  (pinned rule or best match)
//!     → hyper client → backend
//!     → RewriteEngine (outbound) on Location header
//!     → response
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::gateway::topology::{Route, TopologyHandle};
use crate::observability::metrics;
use crate::rewrite::Direction;
use crate::urltemplate::Parser;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub topology: Arc<TopologyHandle>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server fronting the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new server over an already-deployed topology.
    pub fn new(config: GatewayConfig, topology: Arc<TopologyHandle>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = AppState { topology, client };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("gateway server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler: parse, match, rewrite, forward.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> impl IntoResponse {
    let start_time = Instant::now();
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let path_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let method = request.method().clone();
    let method_str = method.to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        url = %path_query,
        "dispatching request"
    );

    // Hold one topology generation for the whole request.
    let topology = state.topology.load();

    // 1. Parse the request URL
    let input = match Parser::parse_literal(&path_query) {
        Ok(input) => input,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "unparseable request url");
            metrics::record_request(&method_str, 400, "none", start_time);
            return (StatusCode::BAD_REQUEST, "Unparseable request URL").into_response();
        }
    };

    // 2. Match a route
    let route: Arc<Route> = match topology.select_route(&input) {
        Some(matched) => Arc::clone(matched.value()),
        None => {
            tracing::warn!(request_id = %request_id, url = %path_query, "no route matched");
            metrics::record_request(&method_str, 404, "none", start_time);
            return (StatusCode::NOT_FOUND, "No matching route found").into_response();
        }
    };

    // 3. Inbound rewrite to the backend URL
    let rewritten = match &route.inbound_rule {
        Some(rule) => topology
            .engine()
            .rewrite_rule(rule, Direction::In, &path_query),
        None => topology.engine().rewrite(Direction::In, &path_query),
    };
    let target = match rewritten {
        Ok(target) => target,
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route.name, error = %e, "inbound rewrite failed");
            metrics::record_request(&method_str, 500, &route.name, start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Rewrite failed").into_response();
        }
    };
    let uri: Uri = match target.parse() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "rewritten url is invalid");
            metrics::record_request(&method_str, 502, &route.name, start_time);
            return (StatusCode::BAD_GATEWAY, "Rewritten URL is invalid").into_response();
        }
    };
    if uri.scheme().is_none() || uri.authority().is_none() {
        tracing::error!(request_id = %request_id, target = %target, "rewritten url is not dispatchable");
        metrics::record_request(&method_str, 502, &route.name, start_time);
        return (StatusCode::BAD_GATEWAY, "Rewritten URL is not dispatchable").into_response();
    }

    // 4. Forward to the backend
    let (parts, body) = request.into_parts();
    let mut upstream = Request::builder()
        .method(method.clone())
        .uri(uri)
        .version(http_version_for_forwarding(parts.version));
    if let Some(headers) = upstream.headers_mut() {
        for (name, value) in parts.headers.iter() {
            if name != header::HOST {
                headers.insert(name.clone(), value.clone());
            }
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", value);
        }
    }
    let upstream = match upstream.body(body) {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "failed to build upstream request");
            metrics::record_request(&method_str, 500, &route.name, start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Dispatch failed").into_response();
        }
    };

    match state.client.request(upstream).await {
        Ok(response) => {
            let status = response.status();
            let (mut parts, body) = response.into_parts();

            // 5. Outbound rewrite of redirect targets
            let location = parts
                .headers
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(location) = location {
                let rewritten = match &route.outbound_rule {
                    Some(rule) => topology
                        .engine()
                        .rewrite_rule(rule, Direction::Out, &location),
                    None => topology.engine().rewrite(Direction::Out, &location),
                };
                match rewritten {
                    Ok(rewritten) => {
                        if let Ok(value) = HeaderValue::from_str(&rewritten) {
                            parts.headers.insert(header::LOCATION, value);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(request_id = %request_id, error = %e, "location rewrite failed, passing header through");
                        metrics::record_rewrite_failure("out");
                    }
                }
            }

            metrics::record_request(&method_str, status.as_u16(), &route.name, start_time);
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, route = %route.name, error = %e, "upstream error");
            metrics::record_request(&method_str, 502, &route.name, start_time);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// The legacy client negotiates its own connection; forward HTTP/2 requests
/// downstream as HTTP/1.1 unless the client spoke 1.x already.
fn http_version_for_forwarding(version: axum::http::Version) -> axum::http::Version {
    match version {
        axum::http::Version::HTTP_10 | axum::http::Version::HTTP_11 => version,
        _ => axum::http::Version::HTTP_11,
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
