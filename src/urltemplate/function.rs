//! Function references inside template parameter names.
//!
//! A parameter position may name a plain parameter (`host`), or call a
//! pluggable function: `$frontend(host)` passes an indirectly resolved
//! parameter, `$hostmap[nn1.internal]` passes the bracketed text verbatim.
//! Function lookup failures never fail expansion; the unresolved values pass
//! through unchanged.

use crate::urltemplate::expander::{Evaluator, Params};

const FUNCTION_MARKUP: char = '$';

/// How a function argument is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionParam {
    /// `(...)` — resolved against the parameter chain first.
    Indirect(String),
    /// `[...]` — used verbatim.
    Literal(String),
}

/// A parsed parameter reference: plain name or `$function` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    function_name: Option<String>,
    parameter: Option<FunctionParam>,
}

impl Function {
    /// Parse a parameter name, recognizing `$func(param)`, `$func[literal]`,
    /// `$func` and plain `name`.
    pub fn parse(name: &str) -> Self {
        let Some(rest) = name.strip_prefix(FUNCTION_MARKUP) else {
            return Function {
                function_name: None,
                parameter: Some(FunctionParam::Indirect(name.to_string())),
            };
        };
        match rest.find(['(', '[']) {
            None => Function {
                function_name: Some(rest.to_string()),
                parameter: None,
            },
            Some(open) => {
                let function_name = rest[..open].to_string();
                let is_indirect = rest[open..].starts_with('(');
                let close = if is_indirect { ')' } else { ']' };
                let inner = &rest[open + 1..];
                let inner = inner.strip_suffix(close).unwrap_or(inner);
                let parameter = if is_indirect {
                    FunctionParam::Indirect(inner.to_string())
                } else {
                    FunctionParam::Literal(inner.to_string())
                };
                Function {
                    function_name: Some(function_name),
                    parameter: Some(parameter),
                }
            }
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        self.function_name.as_deref()
    }

    /// The parameter name this reference consumes from the parameter source,
    /// if any (bracketed literals consume none).
    pub fn parameter_name(&self) -> Option<&str> {
        match &self.parameter {
            Some(FunctionParam::Indirect(name)) => Some(name),
            _ => None,
        }
    }

    /// Resolve this reference. Plain names resolve directly; function calls
    /// resolve their argument first, then consult the evaluator. An unknown
    /// or failing function yields the unresolved argument unchanged.
    pub fn evaluate(
        &self,
        params: &dyn Params,
        evaluator: Option<&dyn Evaluator>,
    ) -> Option<Vec<String>> {
        let resolved = match &self.parameter {
            Some(FunctionParam::Indirect(name)) => {
                params.resolve(name).filter(|v| !v.is_empty())
            }
            Some(FunctionParam::Literal(text)) => Some(vec![text.clone()]),
            None => None,
        };
        match (&self.function_name, evaluator) {
            (Some(function), Some(evaluator)) => {
                let args = resolved.or_else(|| match &self.parameter {
                    Some(FunctionParam::Indirect(name)) => Some(vec![name.clone()]),
                    Some(FunctionParam::Literal(text)) => Some(vec![text.clone()]),
                    None => None,
                });
                let evaluated = {
                    let arg_slice: &[String] = args.as_deref().unwrap_or(&[]);
                    evaluator.evaluate(function, arg_slice)
                };
                evaluated.or(args)
            }
            _ => resolved,
        }
    }
}
