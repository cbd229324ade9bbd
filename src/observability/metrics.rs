//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (request counts, latency, rewrite outcomes)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rewrite_failures_total` (counter): degraded rewrites by direction

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter started"),
        Err(e) => tracing::error!(error = %e, "failed to start metrics exporter"),
    }
}

/// Record one proxied (or refused) request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a rewrite that degraded to pass-through.
pub fn record_rewrite_failure(direction: &str) {
    counter!(
        "gateway_rewrite_failures_total",
        "direction" => direction.to_string()
    )
    .increment(1);
}
