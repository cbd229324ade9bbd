//! Configuration validation.
//!
//! Semantic checks on a deserialized topology, run before compilation so a
//! bad deploy fails with every problem listed at once.

use crate::config::schema::GatewayConfig;
use crate::rewrite::step::StepConfig;
use crate::urltemplate::Parser;
use std::collections::HashSet;
use thiserror::Error;

/// One problem found in a topology configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("route '{0}' has an empty name or pattern")]
    EmptyRoute(String),

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{route}' pattern does not parse: {reason}")]
    RoutePattern { route: String, reason: String },

    #[error("route '{route}' references unknown rule '{rule}'")]
    UnknownRule { route: String, rule: String },

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("rule '{rule}' pattern does not parse: {reason}")]
    RulePattern { rule: String, reason: String },

    #[error("rule '{rule}' step '{step}': {problem}")]
    Step {
        rule: String,
        step: String,
        problem: String,
    },

    #[error("frontend url '{url}' does not parse: {reason}")]
    FrontendUrl { url: String, reason: String },
}

/// Validate a topology configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = url::Url::parse(&config.frontend.url) {
        errors.push(ValidationError::FrontendUrl {
            url: config.frontend.url.clone(),
            reason: e.to_string(),
        });
    }

    let mut rule_names = HashSet::new();
    for rule in &config.rules {
        if !rule_names.insert(rule.name.clone()) {
            errors.push(ValidationError::DuplicateRule(rule.name.clone()));
        }
        if let Some(pattern) = &rule.pattern {
            if let Err(e) = Parser::parse(pattern) {
                errors.push(ValidationError::RulePattern {
                    rule: rule.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
        for step in &rule.steps {
            validate_step(&rule.name, step, &mut errors);
        }
    }

    let mut route_names = HashSet::new();
    for route in &config.routes {
        if route.name.is_empty() || route.pattern.is_empty() {
            errors.push(ValidationError::EmptyRoute(route.name.clone()));
            continue;
        }
        if !route_names.insert(route.name.clone()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if let Err(e) = Parser::parse(&route.pattern) {
            errors.push(ValidationError::RoutePattern {
                route: route.name.clone(),
                reason: e.to_string(),
            });
        }
        for rule in [&route.inbound_rule, &route.outbound_rule]
            .into_iter()
            .flatten()
        {
            if !rule_names.contains(rule) {
                errors.push(ValidationError::UnknownRule {
                    route: route.name.clone(),
                    rule: rule.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_step(rule: &str, step: &StepConfig, errors: &mut Vec<ValidationError>) {
    let mut push = |problem: String, errors: &mut Vec<ValidationError>| {
        errors.push(ValidationError::Step {
            rule: rule.to_string(),
            step: step.step_type.clone(),
            problem,
        });
    };
    match step.step_type.as_str() {
        "match" => {}
        "check" => {
            if step.param.is_none() {
                push("missing 'param'".to_string(), errors);
            }
            if step.pattern.is_none() {
                push("missing 'pattern'".to_string(), errors);
            }
        }
        "rewrite" => {
            if step.template.is_none() {
                push("missing 'template'".to_string(), errors);
            }
            if !step.steps.is_empty() {
                push("action steps cannot nest child steps".to_string(), errors);
            }
        }
        "control" => {
            if !step.steps.is_empty() {
                push("action steps cannot nest child steps".to_string(), errors);
            }
        }
        other => push(format!("unknown step type '{}'", other), errors),
    }
    for pattern in [&step.pattern, &step.template].into_iter().flatten() {
        if let Err(e) = Parser::parse(pattern) {
            push(e.to_string(), errors);
        }
    }
    for child in &step.steps {
        validate_step(rule, child, errors);
    }
}
