//! Compiled topology: route table + rewrite engine.
//!
//! # Responsibilities
//! - Compile a validated configuration into immutable runtime structures
//! - Publish new topology generations with an atomic swap
//!
//! # Design Decisions
//! - A `Topology` is never mutated after compile; concurrent request tasks
//!   read it lock-free through `TopologyHandle`
//! - Old generations are simply dropped once no in-flight request holds them

use crate::config::schema::GatewayConfig;
use crate::rewrite::engine::RewriteEngine;
use crate::rewrite::functions::{FrontendInfo, FunctionRegistry};
use crate::rewrite::RewriteError;
use crate::urltemplate::expander::MapParams;
use crate::urltemplate::matcher::{Match, Matcher};
use crate::urltemplate::template::Template;
use crate::urltemplate::{Parser, TemplateError};
use arc_swap::ArcSwap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while compiling a topology.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// One deployed route: a URL pattern bound to its rewrite rules.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub pattern: Template,
    pub inbound_rule: Option<String>,
    pub outbound_rule: Option<String>,
}

/// The immutable runtime view of one deployed configuration generation.
pub struct Topology {
    routes: Matcher<Arc<Route>>,
    engine: RewriteEngine,
}

impl Topology {
    /// Compile a configuration. Every route pattern parses and every rule
    /// compiles here, so a malformed topology never reaches request traffic.
    pub fn compile(config: &GatewayConfig) -> Result<Self, TopologyError> {
        let frontend = FrontendInfo::from_url(&config.frontend.url)?;
        let mut environment = MapParams::default();
        environment.insert_value("frontend.url", frontend.url.clone());
        environment.insert_value("frontend.scheme", frontend.scheme.clone());
        environment.insert_value("frontend.host", frontend.host.clone());
        environment.insert_value("frontend.port", frontend.port.clone());
        environment.insert_value("frontend.path", frontend.path.clone());
        environment.insert_value("frontend.addr", frontend.addr.clone());

        let functions = FunctionRegistry::standard(frontend, config.hostmap.clone());
        let engine = RewriteEngine::compile(&config.rules, functions, environment)?;

        let mut routes = Matcher::new();
        for route in &config.routes {
            let pattern = Parser::parse(&route.pattern)?;
            routes.add(
                pattern.clone(),
                Arc::new(Route {
                    name: route.name.clone(),
                    pattern,
                    inbound_rule: route.inbound_rule.clone(),
                    outbound_rule: route.outbound_rule.clone(),
                }),
            );
        }
        Ok(Topology { routes, engine })
    }

    /// Select the route for an inbound request URL, if any.
    pub fn select_route<'a>(&'a self, input: &'a Template) -> Option<Match<'a, Arc<Route>>> {
        self.routes.match_template(input)
    }

    pub fn routes(&self) -> &Matcher<Arc<Route>> {
        &self.routes
    }

    pub fn engine(&self) -> &RewriteEngine {
        &self.engine
    }
}

/// Shared handle publishing the current topology generation.
pub struct TopologyHandle {
    current: ArcSwap<Topology>,
}

impl TopologyHandle {
    pub fn new(topology: Topology) -> Self {
        TopologyHandle {
            current: ArcSwap::from_pointee(topology),
        }
    }

    /// The current generation; callers keep the `Arc` for the whole request
    /// so a redeploy mid-request cannot change what they observe.
    pub fn load(&self) -> Arc<Topology> {
        self.current.load_full()
    }

    /// Atomically publish a new generation.
    pub fn redeploy(&self, topology: Topology) {
        self.current.store(Arc::new(topology));
        tracing::info!("topology redeployed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::Direction;

    fn config(source: &str) -> GatewayConfig {
        toml::from_str(source).unwrap()
    }

    const TOPOLOGY: &str = r#"
        [frontend]
        url = "https://gw.example.com:8443/gateway"

        [[routes]]
        name = "webhdfs"
        pattern = "/gateway/webhdfs/{version}/{path=**}?{**}"
        inbound_rule = "webhdfs-in"

        [[rules]]
        name = "webhdfs-in"
        pattern = "/gateway/webhdfs/{version}/{path=**}?{**}"
        directions = ["in"]

        [[rules.steps]]
        type = "rewrite"
        template = "http://nn1.internal:50070/webhdfs/{version}/{path=**}?{**}"
    "#;

    #[test]
    fn test_compile_and_route_selection() {
        let topology = Topology::compile(&config(TOPOLOGY)).unwrap();
        let input = Parser::parse_literal("/gateway/webhdfs/v1/tmp?op=LIST").unwrap();
        let matched = topology.select_route(&input).unwrap();
        assert_eq!(matched.value().name, "webhdfs");

        let input = Parser::parse_literal("/other").unwrap();
        assert!(topology.select_route(&input).is_none());
    }

    #[test]
    fn test_compiled_engine_rewrites() {
        let topology = Topology::compile(&config(TOPOLOGY)).unwrap();
        let rewritten = topology
            .engine()
            .rewrite_rule("webhdfs-in", Direction::In, "/gateway/webhdfs/v1/tmp?op=LIST")
            .unwrap();
        assert_eq!(rewritten, "http://nn1.internal:50070/webhdfs/v1/tmp?op=LIST");
    }

    #[test]
    fn test_malformed_route_pattern_fails_compile() {
        let result = Topology::compile(&config(
            r#"
            [[routes]]
            name = "broken"
            pattern = "/{p=*[}"
            "#,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_redeploy_swaps_generation() {
        let handle = TopologyHandle::new(Topology::compile(&config(TOPOLOGY)).unwrap());
        let before = handle.load();
        assert_eq!(before.routes().len(), 1);

        handle.redeploy(Topology::compile(&GatewayConfig::default()).unwrap());
        let after = handle.load();
        assert_eq!(after.routes().len(), 0);
        // the old generation is still usable by in-flight requests
        assert_eq!(before.routes().len(), 1);
    }
}
