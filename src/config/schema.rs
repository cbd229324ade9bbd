//! Configuration schema definitions.
//!
//! This module defines the complete topology configuration for the gateway.
//! All types derive Serde traits for deserialization from config files.

use crate::rewrite::engine::RuleConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Externally visible gateway address, exposed to rewrite rules through
    /// the `frontend` function.
    pub frontend: FrontendConfig,

    /// Route definitions mapping request URL patterns to rewrite rules.
    pub routes: Vec<RouteConfig>,

    /// Rewrite rule definitions.
    pub rules: Vec<RuleConfig>,

    /// Static external ↔ internal host mapping for the `hostmap` function.
    pub hostmap: HashMap<String, String>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Externally visible gateway address.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Full external URL clients reach the gateway at.
    pub url: String,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/gateway".to_string(),
        }
    }
}

/// Route configuration mapping request URLs to rewrite rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// URL template the inbound request must match.
    pub pattern: String,

    /// Rule applied to the matched request URL; when absent the engine
    /// picks the best-matching inbound rule.
    #[serde(default)]
    pub inbound_rule: Option<String>,

    /// Rule applied to response values (e.g. the Location header); when
    /// absent the engine picks the best-matching outbound rule.
    #[serde(default)]
    pub outbound_rule: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.routes.is_empty());
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_minimal_topology_deserializes() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:8443"

            [frontend]
            url = "https://gw.example.com:8443/gateway"

            [hostmap]
            "gw.example.com" = "nn1.internal"

            [[routes]]
            name = "webhdfs"
            pattern = "/gateway/webhdfs/{version}/{path=**}?{**}"

            [[rules]]
            name = "webhdfs-inbound"
            pattern = "/gateway/webhdfs/{version}/{path=**}?{**}"
            directions = ["in"]

            [[rules.steps]]
            type = "rewrite"
            template = "http://nn1.internal:50070/webhdfs/{version}/{path=**}?{**}"
            "#,
        )
        .unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8443");
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].steps.len(), 1);
        assert_eq!(config.hostmap.get("gw.example.com").unwrap(), "nn1.internal");
    }

    #[test]
    fn test_nested_steps_deserialize() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [[rules]]
            name = "nested"

            [[rules.steps]]
            type = "match"
            pattern = "/a/{x}"
            flow = "or"

            [[rules.steps.steps]]
            type = "rewrite"
            template = "/b/{x}"
            "#,
        )
        .unwrap();
        let step = &config.rules[0].steps[0];
        assert_eq!(step.step_type, "match");
        assert_eq!(step.steps.len(), 1);
    }
}
