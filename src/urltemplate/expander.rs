//! Template + resolved parameters → concrete URL.
//!
//! # Responsibilities
//! - Serialize scheme, authority, path, query, fragment in order, omitting
//!   punctuation for absent optional parts
//! - Substitute wildcard segments with resolved parameter values
//! - Append never-consumed parameters through the extra query bucket
//!
//! # Design Decisions
//! - Glob and Default kinds expand every resolved value (joined with `/` in
//!   the path, repeated `name=value` pairs in the query); Star takes the first
//! - Fragment parameter names are consumed before query names so the extra
//!   bucket never re-emits a name the fragment used, while output order stays
//!   path?query#fragment
//! - Each parameter name is expanded at most once

use crate::urltemplate::function::Function;
use crate::urltemplate::segment::{QuerySegment, Segment, ValueKind};
use crate::urltemplate::template::Template;
use crate::urltemplate::{Parser, TemplateError};
use indexmap::IndexSet;

/// A parameter-resolution source: named, possibly multi-valued parameters.
pub trait Params {
    fn names(&self) -> Vec<String>;
    fn resolve(&self, name: &str) -> Option<Vec<String>>;
}

/// Resolves `$function(...)` references found in parameter positions.
pub trait Evaluator {
    /// Returns `None` for unknown functions or failed evaluations; the caller
    /// then passes the unresolved values through unchanged.
    fn evaluate(&self, function: &str, args: &[String]) -> Option<Vec<String>>;
}

/// A `Params` source with no parameters.
pub struct EmptyParams;

impl Params for EmptyParams {
    fn names(&self) -> Vec<String> {
        Vec::new()
    }

    fn resolve(&self, _name: &str) -> Option<Vec<String>> {
        None
    }
}

/// Simple owned `Params` backed by an insertion-ordered map.
#[derive(Debug, Default, Clone)]
pub struct MapParams {
    map: indexmap::IndexMap<String, Vec<String>>,
}

impl MapParams {
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.map.insert(name.into(), values);
    }

    pub fn insert_value(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map
            .entry(name.into())
            .or_default()
            .push(value.into());
    }
}

impl Params for MapParams {
    fn names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    fn resolve(&self, name: &str) -> Option<Vec<String>> {
        self.map.get(name).cloned()
    }
}

/// Serializes templates with parameter substitution.
pub struct Expander;

impl Expander {
    pub fn expand_to_string(
        template: &Template,
        params: &dyn Params,
        evaluator: Option<&dyn Evaluator>,
    ) -> String {
        let mut names: IndexSet<String> = params.names().into_iter().collect();
        let mut out = String::new();
        expand_scheme(template, &mut names, params, evaluator, &mut out);
        expand_authority(template, &mut names, params, evaluator, &mut out);
        expand_path(template, &mut names, params, evaluator, &mut out);
        if template.has_fragment() {
            let mut fragment = String::new();
            expand_fragment(template, &mut names, params, evaluator, &mut fragment);
            expand_query(template, &mut names, params, evaluator, &mut out);
            out.push_str(&fragment);
        } else {
            expand_query(template, &mut names, params, evaluator, &mut out);
        }
        out
    }

    /// Expand and re-parse as a literal template, for carrying a concrete URL
    /// through further rewriting.
    pub fn expand_to_template(
        template: &Template,
        params: &dyn Params,
        evaluator: Option<&dyn Evaluator>,
    ) -> Result<Template, TemplateError> {
        Parser::parse_literal(&Self::expand_to_string(template, params, evaluator))
    }
}

fn expand_scheme(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    if let Some(scheme) = template.scheme() {
        expand_single_value(scheme, names, params, evaluator, out);
        out.push(':');
    }
}

fn expand_authority(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    if !template.has_authority() {
        return;
    }
    if !template.is_authority_only() {
        out.push_str("//");
    }
    if let Some(username) = template.username() {
        expand_single_value(username, names, params, evaluator, out);
    }
    if let Some(password) = template.password() {
        out.push(':');
        expand_single_value(password, names, params, evaluator, out);
    }
    if template.username().is_some() || template.password().is_some() {
        out.push('@');
    }
    if let Some(host) = template.host() {
        expand_single_value(host, names, params, evaluator, out);
    }
    if let Some(port) = template.port() {
        out.push(':');
        expand_single_value(port, names, params, evaluator, out);
    }
}

fn expand_path(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    if template.is_absolute() {
        out.push('/');
    }
    for (i, segment) in template.path().iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        let function = Function::parse(segment.param_name());
        if let Some(name) = function.parameter_name() {
            names.shift_remove(name);
        }
        let value = segment.first_value();
        match value.kind() {
            ValueKind::Static => {
                out.push_str(value.original_pattern().unwrap_or(""));
            }
            ValueKind::Default | ValueKind::Star | ValueKind::Glob | ValueKind::Regex => {
                let values = function.evaluate(params, evaluator);
                expand_path_values(segment, values, out);
            }
        }
    }
    if template.is_directory() && !template.path().is_empty() {
        out.push('/');
    }
}

fn expand_path_values(segment: &Segment, values: Option<Vec<String>>, out: &mut String) {
    match values {
        Some(values) if !values.is_empty() => {
            let kind = segment.first_value().kind();
            if kind == ValueKind::Glob || kind == ValueKind::Default {
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push('/');
                    }
                    out.push_str(value);
                }
            } else {
                out.push_str(&values[0]);
            }
        }
        _ => {
            let value = segment.first_value();
            out.push_str(value.original_pattern().or(value.effective_pattern()).unwrap_or(""));
        }
    }
}

fn expand_query(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    let mut index = 0;
    expand_explicit_query(template, names, params, evaluator, out, &mut index);
    expand_extra_query(template, names, params, out, &mut index);
}

fn separator(out: &mut String, index: &mut usize) {
    *index += 1;
    out.push(if *index == 1 { '?' } else { '&' });
}

fn expand_explicit_query(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
    index: &mut usize,
) {
    for segment in template.query().values() {
        let function = Function::parse(segment.param_name());
        if let Some(name) = function.parameter_name() {
            names.shift_remove(name);
        }
        for value in segment.values() {
            match value.kind() {
                ValueKind::Static => {
                    separator(out, index);
                    out.push_str(segment.query_name());
                    if let Some(pattern) = value.original_pattern() {
                        out.push('=');
                        out.push_str(&unescape(pattern));
                    }
                }
                ValueKind::Default | ValueKind::Star | ValueKind::Glob | ValueKind::Regex => {
                    let values = function.evaluate(params, evaluator);
                    expand_query_values(segment, values, out, index);
                }
            }
        }
    }
}

fn expand_query_values(
    segment: &QuerySegment,
    values: Option<Vec<String>>,
    out: &mut String,
    index: &mut usize,
) {
    let query_name = segment.query_name();
    match values {
        None => {
            separator(out, index);
            out.push_str(query_name);
        }
        Some(values) if values.is_empty() => {
            separator(out, index);
            out.push_str(query_name);
        }
        Some(values) => {
            let kind = segment.first_value().kind();
            if kind == ValueKind::Glob || kind == ValueKind::Default {
                for value in &values {
                    separator(out, index);
                    append_encoded(query_name, out);
                    out.push('=');
                    append_encoded(value, out);
                }
            } else {
                separator(out, index);
                append_encoded(query_name, out);
                out.push('=');
                append_encoded(&values[0], out);
            }
        }
    }
}

fn expand_extra_query(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    out: &mut String,
    index: &mut usize,
) {
    if template.extra().is_none() {
        return;
    }
    let remaining: Vec<String> = names.iter().cloned().collect();
    for name in remaining {
        names.shift_remove(&name);
        if let Some(values) = params.resolve(&name) {
            for value in values {
                separator(out, index);
                append_encoded(&name, out);
                out.push('=');
                append_encoded(&value, out);
            }
        }
    }
}

fn expand_fragment(
    template: &Template,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    if template.has_fragment() {
        out.push('#');
    }
    if let Some(fragment) = template.fragment() {
        expand_single_value(fragment, names, params, evaluator, out);
    }
}

fn expand_single_value(
    segment: &Segment,
    names: &mut IndexSet<String>,
    params: &dyn Params,
    evaluator: Option<&dyn Evaluator>,
    out: &mut String,
) {
    let function = Function::parse(segment.param_name());
    if let Some(name) = function.parameter_name() {
        names.shift_remove(name);
    }
    let value = segment.first_value();
    match value.kind() {
        ValueKind::Default | ValueKind::Star | ValueKind::Glob | ValueKind::Regex => {
            match function.evaluate(params, evaluator) {
                Some(values) if !values.is_empty() => out.push_str(&values[0]),
                _ => {
                    if function.function_name().is_some() {
                        out.push_str(segment.param_name());
                    } else {
                        out.push_str(
                            value
                                .original_pattern()
                                .or(value.effective_pattern())
                                .unwrap_or(""),
                        );
                    }
                }
            }
        }
        ValueKind::Static => {
            out.push_str(value.original_pattern().unwrap_or(""));
        }
    }
}

fn unescape(pattern: &str) -> String {
    pattern.replace("\\{", "{").replace("\\}", "}")
}

fn append_encoded(part: &str, out: &mut String) {
    out.extend(url::form_urlencoded::byte_serialize(part.as_bytes()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urltemplate::Parser;

    fn expand(pattern: &str, params: &MapParams) -> String {
        let template = Parser::parse(pattern).unwrap();
        Expander::expand_to_string(&template, params, None)
    }

    #[test]
    fn test_static_template_expands_to_itself() {
        let params = MapParams::default();
        assert_eq!(expand("http://host:8080/a/b", &params), "http://host:8080/a/b");
    }

    #[test]
    fn test_host_substitution_with_static_port_default() {
        let mut params = MapParams::default();
        params.insert_value("host", "nn1.example.com");
        assert_eq!(
            expand("http://{host}:{port=50070}/webhdfs", &params),
            "http://nn1.example.com:50070/webhdfs"
        );
    }

    #[test]
    fn test_glob_path_joins_all_values() {
        let mut params = MapParams::default();
        params.insert("p", vec!["x".into(), "y".into(), "z".into()]);
        assert_eq!(expand("/files/{p=**}", &params), "/files/x/y/z");
    }

    #[test]
    fn test_star_path_takes_first_value() {
        let mut params = MapParams::default();
        params.insert("p", vec!["x".into(), "y".into()]);
        assert_eq!(expand("/files/{p=*}", &params), "/files/x");
    }

    #[test]
    fn test_unresolved_path_segment_emits_pattern() {
        let params = MapParams::default();
        assert_eq!(expand("/files/{p=**}", &params), "/files/**");
    }

    #[test]
    fn test_glob_query_repeats_pairs() {
        let mut params = MapParams::default();
        params.insert("v", vec!["1".into(), "2".into()]);
        assert_eq!(expand("/p?name={v=**}", &params), "/p?name=1&name=2");
    }

    #[test]
    fn test_star_query_takes_first_value() {
        let mut params = MapParams::default();
        params.insert("v", vec!["1".into(), "2".into()]);
        assert_eq!(expand("/p?name={v=*}", &params), "/p?name=1");
    }

    #[test]
    fn test_unresolved_query_emits_bare_name() {
        let params = MapParams::default();
        assert_eq!(expand("/p?name={v=*}", &params), "/p?name");
    }

    #[test]
    fn test_static_query_pairs() {
        let params = MapParams::default();
        assert_eq!(expand("/p?name=value&other=x", &params), "/p?name=value&other=x");
    }

    #[test]
    fn test_empty_query_value_expands_bare_when_unresolved() {
        // `flag=` declares a Default-kind value; with nothing to resolve it
        // collapses to the bare name.
        let params = MapParams::default();
        assert_eq!(expand("/p?flag=", &params), "/p?flag");
    }

    #[test]
    fn test_extra_bucket_appends_unconsumed_params() {
        let mut params = MapParams::default();
        params.insert_value("op", "OPEN");
        params.insert_value("offset", "42");
        params.insert_value("length", "7");
        assert_eq!(
            expand("/p?op={op=*}&{**}", &params),
            "/p?op=OPEN&offset=42&length=7"
        );
    }

    #[test]
    fn test_consumed_name_not_reexpanded_by_extra_bucket() {
        let mut params = MapParams::default();
        params.insert_value("p", "seg");
        params.insert_value("other", "x");
        assert_eq!(expand("/{p=*}?{**}", &params), "/seg?other=x");
    }

    #[test]
    fn test_fragment_consumes_name_before_extra_bucket() {
        let mut params = MapParams::default();
        params.insert_value("frag", "section");
        params.insert_value("q", "1");
        assert_eq!(expand("/p?{**}#{frag}", &params), "/p?q=1#section");
    }

    #[test]
    fn test_query_values_are_url_encoded() {
        let mut params = MapParams::default();
        params.insert_value("v", "a b&c");
        assert_eq!(expand("/p?name={v=*}", &params), "/p?name=a+b%26c");
    }

    #[test]
    fn test_authority_only_expansion() {
        let mut params = MapParams::default();
        params.insert_value("host", "nn1");
        params.insert_value("port", "8020");
        assert_eq!(expand("{host}:{port}", &params), "nn1:8020");
    }

    #[test]
    fn test_directory_flag_preserved() {
        let params = MapParams::default();
        assert_eq!(expand("/a/b/", &params), "/a/b/");
    }

    #[test]
    fn test_expand_to_template_round_trip() {
        let mut params = MapParams::default();
        params.insert("p", vec!["x".into(), "y".into()]);
        let template = Parser::parse("/files/{p=**}").unwrap();
        let expanded = Expander::expand_to_template(&template, &params, None).unwrap();
        assert_eq!(expanded.to_string(), "/files/x/y");
        assert_eq!(expanded.path().len(), 3);
    }
}
