//! Per-invocation rewrite state.
//!
//! A context lives for exactly one rewrite attempt: it carries the direction,
//! the original and current URI templates, and a layered parameter chain
//! (step-local bindings override the rule-match bindings, which override the
//! engine-level environment). Contexts are never shared across tasks.

use crate::urltemplate::expander::{Evaluator, Params};
use crate::urltemplate::template::Template;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a value is flowing through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Request values, client → backend.
    In,
    /// Response values, backend → client.
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

/// State threaded through a rule's steps while it evaluates.
pub struct RewriteContext<'a> {
    direction: Direction,
    original: Template,
    current: Template,
    local: IndexMap<String, Vec<String>>,
    environment: &'a dyn Params,
    evaluator: Option<&'a dyn Evaluator>,
}

impl<'a> RewriteContext<'a> {
    pub fn new(
        direction: Direction,
        uri: Template,
        environment: &'a dyn Params,
        evaluator: Option<&'a dyn Evaluator>,
    ) -> Self {
        RewriteContext {
            direction,
            current: uri.clone(),
            original: uri,
            local: IndexMap::new(),
            environment,
            evaluator,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn original_uri(&self) -> &Template {
        &self.original
    }

    pub fn current_uri(&self) -> &Template {
        &self.current
    }

    pub fn set_current_uri(&mut self, uri: Template) {
        self.current = uri;
    }

    pub fn evaluator(&self) -> Option<&'a dyn Evaluator> {
        self.evaluator
    }

    /// Merge bindings into the local layer; later bindings win per name.
    pub fn add_parameters(&mut self, params: &dyn Params) {
        for name in params.names() {
            if let Some(values) = params.resolve(&name) {
                self.local.insert(name, values);
            }
        }
    }

    /// The layered parameter view steps and expansions resolve against.
    pub fn params(&self) -> LayeredParams<'_> {
        LayeredParams {
            local: &self.local,
            environment: self.environment,
        }
    }
}

/// Local bindings over the engine environment.
///
/// Only local names are enumerated: the environment is a resolve-time
/// fallback, so environment values never leak into a template's extra
/// query bucket.
pub struct LayeredParams<'a> {
    local: &'a IndexMap<String, Vec<String>>,
    environment: &'a dyn Params,
}

impl Params for LayeredParams<'_> {
    fn names(&self) -> Vec<String> {
        self.local.keys().cloned().collect()
    }

    fn resolve(&self, name: &str) -> Option<Vec<String>> {
        self.local
            .get(name)
            .cloned()
            .or_else(|| self.environment.resolve(name))
    }
}
