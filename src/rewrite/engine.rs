//! Rule registry and rewrite entry points.
//!
//! # Responsibilities
//! - Compile rule descriptors into an immutable engine
//! - Select the applicable rule for a value (best pattern match per
//!   direction, or targeted lookup by rule name)
//! - Drive rule evaluation and return the rewritten value
//!
//! # Design Decisions
//! - One matcher per direction; a rule without directions serves both
//! - No applicable rule, or a failing rule, passes the value through
//!   unchanged — the gateway stays available when a rewrite is broken

use crate::rewrite::context::{Direction, RewriteContext};
use crate::rewrite::flow::{self, StepFlow, StepStatus};
use crate::rewrite::functions::FunctionRegistry;
use crate::rewrite::step::{Step, StepConfig};
use crate::rewrite::RewriteError;
use crate::urltemplate::expander::{MapParams, Params};
use crate::urltemplate::matcher::{MatchParams, Matcher};
use crate::urltemplate::template::Template;
use crate::urltemplate::Parser;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serde-level rule descriptor, as written in topology configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    pub name: String,
    /// Pattern that selects this rule for a value; a rule without one is
    /// only reachable by name.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Directions this rule applies to; empty means both.
    #[serde(default)]
    pub directions: Vec<Direction>,
    #[serde(default)]
    pub flow: Option<StepFlow>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// A compiled, immutable rewrite rule.
pub struct Rule {
    name: String,
    pattern: Option<Template>,
    matcher: Option<Matcher<()>>,
    directions: Vec<Direction>,
    flow: StepFlow,
    steps: Vec<Step>,
}

impl Rule {
    fn compile(config: &RuleConfig) -> Result<Self, RewriteError> {
        let pattern = config
            .pattern
            .as_deref()
            .map(Parser::parse)
            .transpose()?;
        let matcher = pattern.clone().map(|template| {
            let mut matcher = Matcher::new();
            matcher.add(template, ());
            matcher
        });
        Ok(Rule {
            name: config.name.clone(),
            pattern,
            matcher,
            directions: config.directions.clone(),
            flow: config.flow.unwrap_or_default(),
            steps: Step::compile_all(&config.steps)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> Option<&Template> {
        self.pattern.as_ref()
    }

    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    fn applies_to(&self, direction: Direction) -> bool {
        self.directions.is_empty() || self.directions.contains(&direction)
    }

    /// Bind the rule's pattern against an input. `None` means the pattern
    /// exists but the input does not satisfy it.
    fn bind(&self, input: &Template) -> Option<MatchParams> {
        match &self.matcher {
            None => Some(MatchParams::default()),
            Some(matcher) => matcher.match_template(input).map(|m| m.into_params()),
        }
    }

    /// Evaluate this rule's steps over the input. `Ok(None)` reports rule
    /// failure; the caller decides what pass-through means.
    fn apply(
        &self,
        input: &Template,
        seed: &MatchParams,
        environment: &dyn Params,
        evaluator: &FunctionRegistry,
        direction: Direction,
    ) -> Result<Option<String>, RewriteError> {
        let mut context =
            RewriteContext::new(direction, input.clone(), environment, Some(evaluator));
        context.add_parameters(seed);
        let status = flow::evaluate(self.flow, &self.steps, &mut context)?;
        match status {
            StepStatus::Success | StepStatus::Finished => {
                Ok(Some(context.current_uri().to_string()))
            }
            StepStatus::Failure => Ok(None),
        }
    }
}

/// All compiled rules of one deployed topology.
pub struct RewriteEngine {
    rules: IndexMap<String, Arc<Rule>>,
    inbound: Matcher<Arc<Rule>>,
    outbound: Matcher<Arc<Rule>>,
    functions: FunctionRegistry,
    environment: MapParams,
}

impl RewriteEngine {
    /// Compile rule descriptors. Every template is parsed and every step
    /// type resolved here, so malformed rules fail deployment.
    pub fn compile(
        configs: &[RuleConfig],
        functions: FunctionRegistry,
        environment: MapParams,
    ) -> Result<Self, RewriteError> {
        let mut rules = IndexMap::new();
        let mut inbound = Matcher::new();
        let mut outbound = Matcher::new();
        for config in configs {
            let rule = Arc::new(Rule::compile(config)?);
            if let Some(pattern) = rule.pattern() {
                if rule.applies_to(Direction::In) {
                    inbound.add(pattern.clone(), rule.clone());
                }
                if rule.applies_to(Direction::Out) {
                    outbound.add(pattern.clone(), rule.clone());
                }
            }
            rules.insert(rule.name.clone(), rule);
        }
        Ok(RewriteEngine {
            rules,
            inbound,
            outbound,
            functions,
            environment,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> impl Iterator<Item = &Arc<Rule>> {
        self.rules.values()
    }

    /// Rewrite a value with the best-matching rule for the direction.
    /// Identity when no rule applies or the applicable rule fails.
    pub fn rewrite(&self, direction: Direction, value: &str) -> Result<String, RewriteError> {
        let input = Parser::parse_literal(value)?;
        let matcher = match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        };
        let Some(matched) = matcher.match_template(&input) else {
            tracing::debug!(%direction, value, "no rewrite rule applies");
            return Ok(value.to_string());
        };
        let rule = Arc::clone(matched.value());
        let seed = matched.into_params();
        self.finish(rule.as_ref(), &input, &seed, direction, value)
    }

    /// Rewrite a value with a specific named rule.
    pub fn rewrite_rule(
        &self,
        name: &str,
        direction: Direction,
        value: &str,
    ) -> Result<String, RewriteError> {
        let rule = self
            .rules
            .get(name)
            .ok_or_else(|| RewriteError::UnknownRule(name.to_string()))?;
        let input = Parser::parse_literal(value)?;
        let Some(seed) = rule.bind(&input) else {
            tracing::debug!(rule = name, value, "value does not match rule pattern");
            return Ok(value.to_string());
        };
        self.finish(rule.as_ref(), &input, &seed, direction, value)
    }

    fn finish(
        &self,
        rule: &Rule,
        input: &Template,
        seed: &MatchParams,
        direction: Direction,
        original: &str,
    ) -> Result<String, RewriteError> {
        match rule.apply(input, seed, &self.environment, &self.functions, direction)? {
            Some(rewritten) => {
                tracing::debug!(rule = rule.name(), from = original, to = %rewritten, "value rewritten");
                Ok(rewritten)
            }
            None => {
                tracing::warn!(rule = rule.name(), value = original, "rewrite rule failed, passing value through");
                Ok(original.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn engine(rules_toml: &str) -> RewriteEngine {
        #[derive(Deserialize)]
        struct Rules {
            #[serde(default)]
            rules: Vec<RuleConfig>,
        }
        let rules: Rules = toml::from_str(rules_toml).unwrap();
        let frontend =
            crate::rewrite::functions::FrontendInfo::from_url("https://gw.example.com:8443/gateway")
                .unwrap();
        let mut hostmap = HashMap::new();
        hostmap.insert("gw.example.com".to_string(), "nn1.internal".to_string());
        let functions = FunctionRegistry::standard(frontend, hostmap);
        RewriteEngine::compile(&rules.rules, functions, MapParams::default()).unwrap()
    }

    const WEBHDFS_RULES: &str = r#"
        [[rules]]
        name = "webhdfs-inbound"
        pattern = "*://*:*/gateway/webhdfs/{version}/{path=**}?{**}"
        directions = ["in"]

        [[rules.steps]]
        type = "rewrite"
        template = "http://nn1.internal:50070/webhdfs/{version}/{path=**}?{**}"

        [[rules]]
        name = "webhdfs-outbound"
        pattern = "*://*:*/webhdfs/{version}/{path=**}"
        directions = ["out"]

        [[rules.steps]]
        type = "rewrite"
        template = "{$frontend(url)}/webhdfs/{version}/{path=**}"
    "#;

    #[test]
    fn test_inbound_rewrite_to_backend() {
        let engine = engine(WEBHDFS_RULES);
        let rewritten = engine
            .rewrite(
                Direction::In,
                "https://gw.example.com:8443/gateway/webhdfs/v1/tmp/file?op=OPEN",
            )
            .unwrap();
        assert_eq!(
            rewritten,
            "http://nn1.internal:50070/webhdfs/v1/tmp/file?op=OPEN"
        );
    }

    #[test]
    fn test_outbound_rewrite_to_frontend() {
        let engine = engine(WEBHDFS_RULES);
        let rewritten = engine
            .rewrite(Direction::Out, "http://nn1.internal:50070/webhdfs/v1/tmp/file")
            .unwrap();
        assert_eq!(
            rewritten,
            "https://gw.example.com:8443/gateway/webhdfs/v1/tmp/file"
        );
    }

    #[test]
    fn test_direction_filtering() {
        let engine = engine(WEBHDFS_RULES);
        // the inbound rule must not fire for outbound values
        let value = "https://gw.example.com:8443/gateway/webhdfs/v1/f";
        let rewritten = engine.rewrite(Direction::Out, value).unwrap();
        assert_eq!(rewritten, value);
    }

    #[test]
    fn test_no_matching_rule_is_identity() {
        let engine = engine(WEBHDFS_RULES);
        let value = "/unrelated/path";
        assert_eq!(engine.rewrite(Direction::In, value).unwrap(), value);
    }

    #[test]
    fn test_rewrite_by_name() {
        let engine = engine(WEBHDFS_RULES);
        let rewritten = engine
            .rewrite_rule(
                "webhdfs-inbound",
                Direction::In,
                "https://gw.example.com:8443/gateway/webhdfs/v1/a/b",
            )
            .unwrap();
        assert_eq!(rewritten, "http://nn1.internal:50070/webhdfs/v1/a/b");
    }

    #[test]
    fn test_rewrite_by_unknown_name_is_error() {
        let engine = engine(WEBHDFS_RULES);
        assert!(matches!(
            engine.rewrite_rule("missing", Direction::In, "/v"),
            Err(RewriteError::UnknownRule(_))
        ));
    }

    #[test]
    fn test_named_rule_with_unmatched_pattern_passes_through() {
        let engine = engine(WEBHDFS_RULES);
        let value = "/unrelated";
        assert_eq!(
            engine
                .rewrite_rule("webhdfs-inbound", Direction::In, value)
                .unwrap(),
            value
        );
    }

    #[test]
    fn test_hostmap_function_in_rule() {
        let engine = engine(
            r#"
            [[rules]]
            name = "map-host"
            pattern = "{scheme}://{host}:{port}/{path=**}"

            [[rules.steps]]
            type = "rewrite"
            template = "{scheme}://{$hostmap(host)}:{port}/{path=**}"
            "#,
        );
        let rewritten = engine
            .rewrite(Direction::In, "http://gw.example.com:50070/a/b")
            .unwrap();
        assert_eq!(rewritten, "http://nn1.internal:50070/a/b");
    }

    #[test]
    fn test_failing_rule_passes_value_through() {
        let engine = engine(
            r#"
            [[rules]]
            name = "guarded"
            pattern = "/{path=**}"

            [[rules.steps]]
            type = "check"
            param = "never-bound"
            pattern = "x"

            [[rules.steps]]
            type = "rewrite"
            template = "/never"
            "#,
        );
        let value = "/a/b";
        assert_eq!(engine.rewrite(Direction::In, value).unwrap(), value);
    }

    #[test]
    fn test_control_emits_current_value() {
        let engine = engine(
            r#"
            [[rules]]
            name = "finish-early"
            pattern = "/{path=**}"

            [[rules.steps]]
            type = "control"

            [[rules.steps]]
            type = "rewrite"
            template = "/never"
            "#,
        );
        assert_eq!(engine.rewrite(Direction::In, "/a").unwrap(), "/a");
    }

    #[test]
    fn test_malformed_rule_template_fails_compile() {
        #[derive(Deserialize)]
        struct Rules {
            rules: Vec<RuleConfig>,
        }
        let rules: Rules = toml::from_str(
            r#"
            [[rules]]
            name = "broken"
            pattern = "/{p=*[}"
            "#,
        )
        .unwrap();
        assert!(RewriteEngine::compile(
            &rules.rules,
            FunctionRegistry::new(),
            MapParams::default()
        )
        .is_err());
    }
}
