//! URL rewrite rule engine.
//!
//! # Data Flow
//! ```text
//! rule config (deploy time)
//!     → step.rs (compile descriptors into condition/action steps)
//!     → engine.rs (rule registry + per-direction rule matchers)
//!
//! value to rewrite (request time)
//!     → engine.rs (select best-matching rule for the direction)
//!     → context.rs (per-invocation state: direction, current URI, params)
//!     → flow.rs (AND/OR/ALL evaluation over the rule's steps)
//!     → expander (rewrite actions materialize the new value)
//! ```
//!
//! # Design Decisions
//! - Rules compile once at deploy time and are immutable afterwards; a
//!   redeploy builds a whole new engine and swaps it in
//! - Step types are a closed set dispatched by `match`, not runtime lookup
//! - A broken rule degrades to pass-through, never a failed request

pub mod context;
pub mod engine;
pub mod flow;
pub mod functions;
pub mod step;

pub use context::{Direction, RewriteContext};
pub use engine::{RewriteEngine, Rule};
pub use flow::{StepFlow, StepStatus};
pub use functions::{FunctionRegistry, FrontendInfo, RewriteFunction};
pub use step::Step;

use crate::urltemplate::TemplateError;
use thiserror::Error;

/// Errors raised while compiling or evaluating rewrite rules.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// A template inside a rule or step failed to parse.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// A targeted rewrite referenced a rule name that is not registered.
    #[error("unknown rewrite rule '{0}'")]
    UnknownRule(String),

    /// A step descriptor used a type outside the compiled-in set.
    #[error("unknown rewrite step type '{0}'")]
    UnknownStepType(String),

    /// A step descriptor is missing a field its type requires.
    #[error("rewrite step '{step}' requires '{field}'")]
    MissingField {
        step: &'static str,
        field: &'static str,
    },

    /// Only condition steps may nest child steps.
    #[error("rewrite step '{0}' cannot have child steps")]
    UnexpectedChildren(&'static str),

    /// A rewrite function reported a hard failure (logged, then degraded to
    /// pass-through by the resolver boundary).
    #[error("rewrite function '{function}' failed: {reason}")]
    Function { function: String, reason: String },

    /// The configured externally visible gateway address is unusable.
    #[error("invalid frontend url '{url}': {reason}")]
    Frontend { url: String, reason: String },
}
