//! Pluggable rewrite functions.
//!
//! Rewrite values may call named functions (`{$frontend(host)}`,
//! `{$hostmap(inboundHost)}`). Functions are registered once per deployed
//! topology; lookup failures and function errors are logged and degrade to
//! pass-through so a broken function can never abort request processing.

use crate::rewrite::RewriteError;
use crate::urltemplate::expander::Evaluator;
use std::collections::HashMap;

/// A named transform applied to resolved rewrite values.
pub trait RewriteFunction: Send + Sync {
    fn resolve(&self, args: &[String]) -> Result<Vec<String>, RewriteError>;
}

/// Registry of rewrite functions for one deployed topology.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Box<dyn RewriteFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in functions: `frontend` and `hostmap`.
    pub fn standard(frontend: FrontendInfo, hostmap: HashMap<String, String>) -> Self {
        let mut registry = Self::new();
        registry.register("frontend", FrontendFunction { info: frontend });
        registry.register("hostmap", HostmapFunction::new(hostmap));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: impl RewriteFunction + 'static) {
        self.functions.insert(name.into(), Box::new(function));
    }
}

impl Evaluator for FunctionRegistry {
    fn evaluate(&self, function: &str, args: &[String]) -> Option<Vec<String>> {
        match self.functions.get(function) {
            None => {
                tracing::warn!(function, "unknown rewrite function, passing value through");
                None
            }
            Some(f) => match f.resolve(args) {
                Ok(values) => Some(values),
                Err(error) => {
                    tracing::warn!(function, %error, "rewrite function failed, passing value through");
                    None
                }
            },
        }
    }
}

/// Pieces of the externally visible gateway address.
#[derive(Debug, Clone)]
pub struct FrontendInfo {
    pub url: String,
    pub scheme: String,
    pub host: String,
    pub port: String,
    pub path: String,
    pub addr: String,
}

impl FrontendInfo {
    /// Derive the pieces from the configured frontend URL.
    pub fn from_url(url: &str) -> Result<Self, RewriteError> {
        let parsed = url::Url::parse(url).map_err(|e| RewriteError::Frontend {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed.host_str().ok_or_else(|| RewriteError::Frontend {
            url: url.to_string(),
            reason: "frontend url has no host".to_string(),
        })?;
        let port = parsed
            .port_or_known_default()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let addr = if port.is_empty() {
            host.to_string()
        } else {
            format!("{}:{}", host, port)
        };
        Ok(FrontendInfo {
            url: url.trim_end_matches('/').to_string(),
            scheme: parsed.scheme().to_string(),
            host: host.to_string(),
            port,
            path: parsed.path().trim_end_matches('/').to_string(),
            addr,
        })
    }
}

/// Exposes the externally visible gateway address to rewrite values.
struct FrontendFunction {
    info: FrontendInfo,
}

impl RewriteFunction for FrontendFunction {
    fn resolve(&self, args: &[String]) -> Result<Vec<String>, RewriteError> {
        args.iter()
            .map(|arg| match arg.as_str() {
                "url" => Ok(self.info.url.clone()),
                "scheme" => Ok(self.info.scheme.clone()),
                "host" => Ok(self.info.host.clone()),
                "port" => Ok(self.info.port.clone()),
                "path" => Ok(self.info.path.clone()),
                "addr" | "address" => Ok(self.info.addr.clone()),
                other => Err(RewriteError::Function {
                    function: "frontend".to_string(),
                    reason: format!("unknown selector '{}'", other),
                }),
            })
            .collect()
    }
}

/// Static host mapping between external and internal names. Unmapped hosts
/// pass through unchanged.
struct HostmapFunction {
    forward: HashMap<String, String>,
    reverse: HashMap<String, String>,
}

impl HostmapFunction {
    fn new(mapping: HashMap<String, String>) -> Self {
        let reverse = mapping
            .iter()
            .map(|(k, v)| (v.clone(), k.clone()))
            .collect();
        HostmapFunction {
            forward: mapping,
            reverse,
        }
    }
}

impl RewriteFunction for HostmapFunction {
    fn resolve(&self, args: &[String]) -> Result<Vec<String>, RewriteError> {
        Ok(args
            .iter()
            .map(|host| {
                self.forward
                    .get(host)
                    .or_else(|| self.reverse.get(host))
                    .unwrap_or(host)
                    .clone()
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontend() -> FrontendInfo {
        FrontendInfo::from_url("https://gateway.example.com:8443/gateway/sandbox").unwrap()
    }

    #[test]
    fn test_frontend_pieces() {
        let info = frontend();
        assert_eq!(info.scheme, "https");
        assert_eq!(info.host, "gateway.example.com");
        assert_eq!(info.port, "8443");
        assert_eq!(info.path, "/gateway/sandbox");
        assert_eq!(info.addr, "gateway.example.com:8443");
    }

    #[test]
    fn test_frontend_default_port() {
        let info = FrontendInfo::from_url("http://gw.example.com/g").unwrap();
        assert_eq!(info.port, "80");
        assert_eq!(info.addr, "gw.example.com:80");
    }

    #[test]
    fn test_frontend_function_selectors() {
        let registry = FunctionRegistry::standard(frontend(), HashMap::new());
        assert_eq!(
            registry.evaluate("frontend", &["host".to_string()]),
            Some(vec!["gateway.example.com".to_string()])
        );
        assert_eq!(
            registry.evaluate("frontend", &["addr".to_string()]),
            Some(vec!["gateway.example.com:8443".to_string()])
        );
    }

    #[test]
    fn test_frontend_unknown_selector_degrades_to_none() {
        let registry = FunctionRegistry::standard(frontend(), HashMap::new());
        assert_eq!(registry.evaluate("frontend", &["bogus".to_string()]), None);
    }

    #[test]
    fn test_hostmap_maps_both_directions() {
        let mut mapping = HashMap::new();
        mapping.insert("external.example.com".to_string(), "nn1.internal".to_string());
        let registry = FunctionRegistry::standard(frontend(), mapping);
        assert_eq!(
            registry.evaluate("hostmap", &["external.example.com".to_string()]),
            Some(vec!["nn1.internal".to_string()])
        );
        assert_eq!(
            registry.evaluate("hostmap", &["nn1.internal".to_string()]),
            Some(vec!["external.example.com".to_string()])
        );
        assert_eq!(
            registry.evaluate("hostmap", &["unmapped".to_string()]),
            Some(vec!["unmapped".to_string()])
        );
    }

    #[test]
    fn test_unknown_function_is_none() {
        let registry = FunctionRegistry::new();
        assert_eq!(registry.evaluate("nope", &["x".to_string()]), None);
    }

    #[test]
    fn test_invalid_frontend_url_is_rejected() {
        assert!(FrontendInfo::from_url("not a url").is_err());
    }
}
