//! Rewrite step compilation and processing.
//!
//! # Responsibilities
//! - Compile step descriptors from configuration into condition/action steps
//! - Process steps against a rewrite context
//!
//! # Design Decisions
//! - The step-type registry is the `match` in [`Step::compile`]; adding a
//!   type means adding an arm, and unknown types fail deployment
//! - Conditions may nest child steps under their own flow; actions may not
//! - A condition's own outcome gates its children: only `Success` descends

use crate::rewrite::context::RewriteContext;
use crate::rewrite::flow::{self, StepFlow, StepStatus};
use crate::rewrite::RewriteError;
use crate::urltemplate::expander::Expander;
use crate::urltemplate::matcher::Matcher;
use crate::urltemplate::template::Template;
use crate::urltemplate::Parser;

/// Serde-level step descriptor, as written in topology configuration.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct StepConfig {
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub flow: Option<StepFlow>,
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

/// A compiled rewrite step.
#[derive(Debug)]
pub enum Step {
    Condition {
        condition: Condition,
        flow: StepFlow,
        steps: Vec<Step>,
    },
    Action(Action),
}

#[derive(Debug)]
pub enum Condition {
    /// Match the context's current URI, binding parameters on success.
    /// Without a pattern the condition is a pure grouping step.
    Match(Option<MatchCondition>),
    /// Test a resolved parameter value against a pattern.
    Check(CheckCondition),
}

#[derive(Debug)]
pub struct MatchCondition {
    matcher: Matcher<()>,
}

#[derive(Debug)]
pub struct CheckCondition {
    param: String,
    matcher: Matcher<()>,
}

#[derive(Debug)]
pub enum Action {
    /// Expand a template against the context parameters and replace the
    /// current URI with the result.
    Rewrite { template: Template },
    /// Stop the rule immediately, emitting the current value as-is.
    Control,
}

impl Step {
    /// Compile one descriptor. This is the complete step-type registry.
    pub fn compile(config: &StepConfig) -> Result<Step, RewriteError> {
        match config.step_type.as_str() {
            "match" => {
                let condition = match &config.pattern {
                    None => None,
                    Some(pattern) => {
                        let template = Parser::parse(pattern)?;
                        let mut matcher = Matcher::new();
                        matcher.add(template, ());
                        Some(MatchCondition { matcher })
                    }
                };
                Ok(Step::Condition {
                    condition: Condition::Match(condition),
                    flow: config.flow.unwrap_or_default(),
                    steps: Self::compile_all(&config.steps)?,
                })
            }
            "check" => {
                let param = config.param.clone().ok_or(RewriteError::MissingField {
                    step: "check",
                    field: "param",
                })?;
                let pattern = config.pattern.as_deref().ok_or(RewriteError::MissingField {
                    step: "check",
                    field: "pattern",
                })?;
                let template = Parser::parse(pattern)?;
                let mut matcher = Matcher::new();
                matcher.add(template, ());
                Ok(Step::Condition {
                    condition: Condition::Check(CheckCondition { param, matcher }),
                    flow: config.flow.unwrap_or_default(),
                    steps: Self::compile_all(&config.steps)?,
                })
            }
            "rewrite" => {
                if !config.steps.is_empty() {
                    return Err(RewriteError::UnexpectedChildren("rewrite"));
                }
                let template = config.template.as_deref().ok_or(RewriteError::MissingField {
                    step: "rewrite",
                    field: "template",
                })?;
                Ok(Step::Action(Action::Rewrite {
                    template: Parser::parse(template)?,
                }))
            }
            "control" => {
                if !config.steps.is_empty() {
                    return Err(RewriteError::UnexpectedChildren("control"));
                }
                Ok(Step::Action(Action::Control))
            }
            other => Err(RewriteError::UnknownStepType(other.to_string())),
        }
    }

    pub fn compile_all(configs: &[StepConfig]) -> Result<Vec<Step>, RewriteError> {
        configs.iter().map(Self::compile).collect()
    }

    pub fn is_condition(&self) -> bool {
        matches!(self, Step::Condition { .. })
    }

    pub fn process(&self, context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
        match self {
            Step::Condition {
                condition,
                flow: step_flow,
                steps,
            } => {
                let status = condition.process(context)?;
                if status == StepStatus::Success && !steps.is_empty() {
                    flow::evaluate(*step_flow, steps, context)
                } else {
                    Ok(status)
                }
            }
            Step::Action(action) => action.process(context),
        }
    }
}

impl Condition {
    fn process(&self, context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
        match self {
            Condition::Match(None) => Ok(StepStatus::Success),
            Condition::Match(Some(condition)) => {
                let bound = condition
                    .matcher
                    .match_template(context.current_uri())
                    .map(|m| m.into_params());
                match bound {
                    Some(params) => {
                        context.add_parameters(&params);
                        Ok(StepStatus::Success)
                    }
                    None => Ok(StepStatus::Failure),
                }
            }
            Condition::Check(condition) => Ok(condition.process(context)),
        }
    }
}

impl CheckCondition {
    fn process(&self, context: &RewriteContext<'_>) -> StepStatus {
        use crate::urltemplate::expander::Params;
        let values = context.params().resolve(&self.param);
        let Some(value) = values.as_ref().and_then(|v| v.first()) else {
            return StepStatus::Failure;
        };
        let Ok(literal) = Parser::parse_literal(value) else {
            return StepStatus::Failure;
        };
        match self.matcher.match_template(&literal) {
            Some(_) => StepStatus::Success,
            None => StepStatus::Failure,
        }
    }
}

impl Action {
    fn process(&self, context: &mut RewriteContext<'_>) -> Result<StepStatus, RewriteError> {
        match self {
            Action::Rewrite { template } => {
                let expanded =
                    Expander::expand_to_template(template, &context.params(), context.evaluator())?;
                context.set_current_uri(expanded);
                Ok(StepStatus::Success)
            }
            Action::Control => Ok(StepStatus::Finished),
        }
    }
}
