//! Segment model for URL templates.
//!
//! # Responsibilities
//! - Represent one structural piece of a URL (scheme, host, a path element, ...)
//! - Classify each candidate value by specificity (Static > Regex > Star > Default > Glob)
//! - Answer "does this template segment accept that input segment?"
//!
//! # Design Decisions
//! - Value kind is a closed enum matched exhaustively; the compiled regex for
//!   the Regex kind lives on the Value itself
//! - Values keep insertion order; the first value is the segment's primary one
//! - Specificity ordinals drive match tie-breaking in the matcher

use crate::urltemplate::TemplateError;
use regex::Regex;

/// Parameter name used for tokens without a `{name}` binding.
pub const ANONYMOUS_PARAM: &str = "";
/// Pattern that matches anything and binds at most one value.
pub const DEFAULT_PATTERN: &str = "";
/// Pattern that matches exactly one path element or value.
pub const STAR_PATTERN: &str = "*";
/// Pattern that matches zero or more path elements.
pub const GLOB_PATTERN: &str = "**";

/// One parsed token of a template: `{name}`, `{name=pattern}` or a bare literal.
///
/// `original_pattern` is the pattern text as written (absent for `{name}`),
/// while `effective_pattern` is what matching actually uses after positional
/// defaults are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub param_name: String,
    pub original_pattern: Option<String>,
    pub effective_pattern: Option<String>,
    pub literal: bool,
}

impl Token {
    pub fn new(
        param_name: impl Into<String>,
        original_pattern: Option<String>,
        effective_pattern: Option<String>,
        literal: bool,
    ) -> Self {
        Token {
            param_name: param_name.into(),
            original_pattern,
            effective_pattern,
            literal,
        }
    }

    /// Token whose effective pattern is the pattern as written.
    pub fn simple(param_name: impl Into<String>, pattern: Option<String>, literal: bool) -> Self {
        Token {
            param_name: param_name.into(),
            original_pattern: pattern.clone(),
            effective_pattern: pattern,
            literal,
        }
    }
}

/// Specificity class of a segment value, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Static,
    Regex,
    Star,
    Default,
    Glob,
}

impl ValueKind {
    /// Ordinal used for match tie-breaking; lower wins.
    pub fn specificity(self) -> u8 {
        match self {
            ValueKind::Static => 1,
            ValueKind::Regex => 2,
            ValueKind::Star => 3,
            ValueKind::Default => 4,
            ValueKind::Glob => 5,
        }
    }
}

/// Ordinal reported for tree positions that carry no segment at all.
pub(crate) const UNKNOWN_SPECIFICITY: u8 = 6;

/// A single candidate pattern bound to a segment.
#[derive(Debug, Clone)]
pub struct Value {
    token: Token,
    kind: ValueKind,
    regex: Option<Regex>,
}

impl Value {
    /// Classify a token into its value kind, compiling the glob-style regex
    /// for patterns that contain `*` but are not exactly `*` or `**`.
    pub fn new(token: Token) -> Result<Self, TemplateError> {
        let effective = token.effective_pattern.as_deref();
        let (kind, regex) = if token.literal {
            (ValueKind::Static, None)
        } else {
            match effective {
                Some(DEFAULT_PATTERN) => (ValueKind::Default, None),
                Some(STAR_PATTERN) => (ValueKind::Star, None),
                Some(GLOB_PATTERN) => (ValueKind::Glob, None),
                Some(p) if p.contains('*') => (ValueKind::Regex, Some(compile_glob(p)?)),
                _ => (ValueKind::Static, None),
            }
        };
        Ok(Value { token, kind, regex })
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn original_pattern(&self) -> Option<&str> {
        self.token.original_pattern.as_deref()
    }

    pub fn effective_pattern(&self) -> Option<&str> {
        self.token.effective_pattern.as_deref()
    }

    /// Whether this template value accepts the given input value.
    ///
    /// Static compares pattern text, wildcards accept anything, Regex runs
    /// the compiled pattern against the input's effective text.
    pub fn matches(&self, input: &Value) -> bool {
        match self.kind {
            ValueKind::Static => self.token.original_pattern == input.token.original_pattern,
            ValueKind::Default | ValueKind::Star | ValueKind::Glob => true,
            ValueKind::Regex => {
                let text = input.token.effective_pattern.as_deref().unwrap_or("");
                self.regex
                    .as_ref()
                    .map(|r| r.is_match(text))
                    .unwrap_or(false)
            }
        }
    }
}

/// Translate a simplified filesystem-style wildcard into an anchored regex:
/// `*` becomes `.*`, and `. \ { } $` are escaped.
fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    for c in pattern.chars() {
        match c {
            '*' => out.push_str(".*"),
            '\\' | '.' | '{' | '}' | '$' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn compile_glob(pattern: &str) -> Result<Regex, TemplateError> {
    Regex::new(&format!("^(?:{})$", glob_to_regex(pattern)))
        .map_err(|e| TemplateError::malformed(pattern, e.to_string()))
}

/// One structural piece of a template holding one or more candidate values.
#[derive(Debug, Clone)]
pub struct Segment {
    token: Token,
    values: Vec<Value>,
}

impl Segment {
    pub fn new(token: Token) -> Result<Self, TemplateError> {
        let value = Value::new(token.clone())?;
        Ok(Segment {
            token,
            values: vec![value],
        })
    }

    pub fn param_name(&self) -> &str {
        &self.token.param_name
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn first_value(&self) -> &Value {
        &self.values[0]
    }

    /// Add another candidate value, replacing an existing value with the same
    /// effective pattern in place (insertion order is preserved).
    pub(crate) fn add_value(&mut self, token: Token) -> Result<(), TemplateError> {
        let value = Value::new(token)?;
        if let Some(existing) = self
            .values
            .iter_mut()
            .find(|v| v.token.effective_pattern == value.token.effective_pattern)
        {
            *existing = value;
        } else {
            self.values.push(value);
        }
        Ok(())
    }

    /// Whether any of this segment's values accepts any of the input's values.
    pub fn matches(&self, input: &Segment) -> bool {
        self.values
            .iter()
            .any(|v| input.values.iter().any(|i| v.matches(i)))
    }

    /// Structural identity used for sharing matcher tree nodes: same parameter
    /// name and the same set of effective patterns.
    pub(crate) fn same_shape(&self, other: &Segment) -> bool {
        self.token.param_name == other.token.param_name
            && self.values.len() == other.values.len()
            && self.values.iter().all(|v| {
                other
                    .values
                    .iter()
                    .any(|o| o.token.effective_pattern == v.token.effective_pattern)
            })
    }

    /// Lowest (most specific) value-kind ordinal across this segment's values.
    pub(crate) fn min_specificity(&self) -> u8 {
        self.values
            .iter()
            .map(|v| v.kind.specificity())
            .min()
            .unwrap_or(UNKNOWN_SPECIFICITY)
    }

    pub(crate) fn has_glob(&self) -> bool {
        self.values.iter().any(|v| v.kind == ValueKind::Glob)
    }
}

/// A query parameter segment: a segment plus the literal key used in `?k=v`.
#[derive(Debug, Clone)]
pub struct QuerySegment {
    query_name: String,
    segment: Segment,
}

impl QuerySegment {
    pub fn new(query_name: impl Into<String>, token: Token) -> Result<Self, TemplateError> {
        Ok(QuerySegment {
            query_name: query_name.into(),
            segment: Segment::new(token)?,
        })
    }

    pub fn query_name(&self) -> &str {
        &self.query_name
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn param_name(&self) -> &str {
        self.segment.param_name()
    }

    pub fn values(&self) -> &[Value] {
        self.segment.values()
    }

    pub fn first_value(&self) -> &Value {
        self.segment.first_value()
    }

    pub fn matches(&self, input: &QuerySegment) -> bool {
        self.segment.matches(&input.segment)
    }

    pub(crate) fn add_value(&mut self, token: Token) -> Result<(), TemplateError> {
        self.segment.add_value(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(pattern: Option<&str>) -> Value {
        Value::new(Token::simple("", pattern.map(str::to_string), false)).unwrap()
    }

    fn literal(text: &str) -> Value {
        Value::new(Token::simple("", Some(text.to_string()), true)).unwrap()
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(value(Some("data")).kind(), ValueKind::Static);
        assert_eq!(value(Some("")).kind(), ValueKind::Default);
        assert_eq!(value(Some("*")).kind(), ValueKind::Star);
        assert_eq!(value(Some("**")).kind(), ValueKind::Glob);
        assert_eq!(value(Some("*.ext")).kind(), ValueKind::Regex);
        assert_eq!(literal("*").kind(), ValueKind::Static);
    }

    #[test]
    fn test_specificity_ordering() {
        assert!(ValueKind::Static.specificity() < ValueKind::Regex.specificity());
        assert!(ValueKind::Regex.specificity() < ValueKind::Star.specificity());
        assert!(ValueKind::Star.specificity() < ValueKind::Default.specificity());
        assert!(ValueKind::Default.specificity() < ValueKind::Glob.specificity());
    }

    #[test]
    fn test_static_matches_exact_text() {
        assert!(value(Some("data")).matches(&literal("data")));
        assert!(!value(Some("data")).matches(&literal("other")));
    }

    #[test]
    fn test_wildcards_match_anything() {
        for pattern in [Some(""), Some("*"), Some("**")] {
            assert!(value(pattern).matches(&literal("anything")));
        }
    }

    #[test]
    fn test_regex_matches_whole_text() {
        let v = value(Some("*.ext"));
        assert!(v.matches(&literal("file.ext")));
        assert!(!v.matches(&literal("file.ext.gz")));
        assert!(!v.matches(&literal("file.other")));
    }

    #[test]
    fn test_regex_escapes_dots() {
        let v = value(Some("host.*.example"));
        assert!(v.matches(&literal("host.a.example")));
        assert!(!v.matches(&literal("hostXaXexample")));
    }

    #[test]
    fn test_invalid_regex_pattern_is_rejected() {
        let result = Value::new(Token::simple("", Some("*[".to_string()), false));
        assert!(result.is_err());
    }

    #[test]
    fn test_segment_any_pair_matching() {
        let mut seg = Segment::new(Token::simple("p", Some("a".to_string()), false)).unwrap();
        seg.add_value(Token::simple("p", Some("b".to_string()), false))
            .unwrap();
        let input = Segment::new(Token::simple("", Some("b".to_string()), true)).unwrap();
        assert!(seg.matches(&input));
    }
}
