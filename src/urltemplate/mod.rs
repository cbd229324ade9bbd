//! URL template engine.
//!
//! # Data Flow
//! ```text
//! pattern string
//!     → parser.rs (anchored regex split + token parse)
//!     → Template (immutable, typed segments)
//!     → matcher.rs (best-match against registered templates, param binding)
//!     → expander.rs (template + resolved params → concrete URL)
//! ```
//!
//! # Design Decisions
//! - Templates are immutable once parsed; matchers are immutable once built
//! - Segment values are a closed enum (Static/Regex/Star/Default/Glob)
//!   ordered by specificity; no downcasting anywhere
//! - Everything here is synchronous pure computation; no I/O, no locks

pub mod expander;
pub mod function;
pub mod matcher;
pub mod parser;
pub mod segment;
pub mod template;

pub use expander::{Evaluator, Expander, Params};
pub use function::Function;
pub use matcher::{Match, Matcher};
pub use parser::Parser;
pub use segment::{QuerySegment, Segment, Token, Value, ValueKind};
pub use template::{Builder, Template};

use thiserror::Error;

/// Errors produced while parsing or compiling a URL template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The pattern string could not be tokenized into a well-formed template.
    #[error("malformed url template '{template}': {reason}")]
    Malformed { template: String, reason: String },
}

impl TemplateError {
    pub(crate) fn malformed(template: impl Into<String>, reason: impl Into<String>) -> Self {
        TemplateError::Malformed {
            template: template.into(),
            reason: reason.into(),
        }
    }
}
