//! Best-match selection over registered URL templates.
//!
//! # Responsibilities
//! - Index (template → value) registrations in a shared-prefix tree
//! - Select the single best-matching registration for a concrete input
//! - Extract concrete parameter bindings from the matched input
//!
//! # Design Decisions
//! - The tree is append-only and immutable once built; lookups never mutate,
//!   so a built matcher is freely shared across request tasks
//! - Tie-breaking is positional: deeper matches win, then the more specific
//!   value kind (Static < Regex < Star < Default < Glob by ordinal)
//! - Glob path segments keep their node as a live candidate so they can
//!   consume any number of trailing path elements
//! - A registered port segment is optional on input: URLs omit default ports
//! - Absence of a match is an explicit `None`, never an error

use crate::urltemplate::expander::Params;
use crate::urltemplate::segment::{Segment, GLOB_PATTERN, UNKNOWN_SPECIFICITY};
use crate::urltemplate::template::Template;
use indexmap::IndexMap;

/// Parameter bindings extracted from a matched input template.
#[derive(Debug, Default, Clone)]
pub struct MatchParams {
    map: IndexMap<String, Vec<String>>,
}

impl MatchParams {
    fn add_value(&mut self, name: &str, value: String) {
        self.map.entry(name.to_string()).or_default().push(value);
    }

    fn insert_value(&mut self, name: &str, value: String) {
        self.map
            .entry(name.to_string())
            .or_default()
            .insert(0, value);
    }
}

impl Params for MatchParams {
    fn names(&self) -> Vec<String> {
        self.map.keys().cloned().collect()
    }

    fn resolve(&self, name: &str) -> Option<Vec<String>> {
        self.map.get(name).cloned()
    }
}

/// A successful match: the winning registration plus extracted bindings.
#[derive(Debug)]
pub struct Match<'a, V> {
    template: &'a Template,
    value: &'a V,
    params: MatchParams,
}

impl<'a, V> Match<'a, V> {
    pub fn template(&self) -> &'a Template {
        self.template
    }

    pub fn value(&self) -> &'a V {
        self.value
    }

    pub fn params(&self) -> &MatchParams {
        &self.params
    }

    pub fn into_params(self) -> MatchParams {
        self.params
    }
}

#[derive(Debug)]
struct Registration<V> {
    template: Template,
    value: V,
}

#[derive(Debug)]
struct PathNode {
    depth: usize,
    segment: Option<Segment>,
    children: Vec<usize>,
    /// Registrations whose template declares query parameters ending here.
    queries: Vec<usize>,
    /// Registration whose query-less template ends here (first one wins).
    leaf: Option<usize>,
    is_port: bool,
}

impl PathNode {
    fn kind_ordinal(&self) -> u8 {
        self.segment
            .as_ref()
            .map(|s| s.min_specificity())
            .unwrap_or(UNKNOWN_SPECIFICITY)
    }

    fn has_glob(&self) -> bool {
        self.segment.as_ref().map(|s| s.has_glob()).unwrap_or(false)
    }
}

/// One step of the candidate walk; entries form a chain back to the root so
/// parameter bindings can be recovered from the winning leaf.
struct MatchEntry<'a> {
    parent: Option<usize>,
    node: usize,
    template_segment: Option<&'a Segment>,
    input_segment: Option<&'a Segment>,
}

struct Status<'a> {
    entries: Vec<MatchEntry<'a>>,
    candidates: Vec<usize>,
}

impl<'a> Status<'a> {
    fn new() -> Self {
        Status {
            entries: vec![MatchEntry {
                parent: None,
                node: 0,
                template_segment: None,
                input_segment: None,
            }],
            candidates: vec![0],
        }
    }

    fn push(&mut self, entry: MatchEntry<'a>) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }
}

/// Indexes many (template → value) registrations for best-match lookup.
#[derive(Debug)]
pub struct Matcher<V> {
    registrations: Vec<Registration<V>>,
    nodes: Vec<PathNode>,
}

impl<V> Default for Matcher<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Matcher<V> {
    pub fn new() -> Self {
        Matcher {
            registrations: Vec::new(),
            nodes: vec![PathNode {
                depth: 0,
                segment: None,
                children: Vec::new(),
                queries: Vec::new(),
                leaf: None,
                is_port: false,
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Look up the value registered for a structurally equal template.
    pub fn get(&self, template: &Template) -> Option<&V> {
        self.registrations
            .iter()
            .find(|r| r.template == *template)
            .map(|r| &r.value)
    }

    /// Register a template. Registration order breaks exact ties: the first
    /// query-less template ending at a node keeps that node.
    pub fn add(&mut self, template: Template, value: V) {
        let reg = self.registrations.len();
        let mut node = 0;
        node = self.descend(node, template.scheme(), false);
        node = self.descend(node, template.username(), false);
        node = self.descend(node, template.password(), false);
        node = self.descend(node, template.host(), false);
        node = self.descend(node, template.port(), true);
        for segment in template.path() {
            node = self.descend(node, Some(segment), false);
        }
        // Fragments sit above query parameters in the match order.
        node = self.descend(node, template.fragment(), false);
        if template.query().is_empty() && template.extra().is_none() {
            if self.nodes[node].leaf.is_none() {
                self.nodes[node].leaf = Some(reg);
            }
        } else {
            self.nodes[node].queries.push(reg);
        }
        self.registrations.push(Registration { template, value });
    }

    fn descend(&mut self, parent: usize, segment: Option<&Segment>, is_port: bool) -> usize {
        let Some(segment) = segment else {
            return parent;
        };
        let existing = self.nodes[parent].children.iter().copied().find(|&child| {
            self.nodes[child]
                .segment
                .as_ref()
                .map(|s| s.same_shape(segment))
                .unwrap_or(false)
        });
        if let Some(child) = existing {
            return child;
        }
        let child = self.nodes.len();
        self.nodes.push(PathNode {
            depth: self.nodes[parent].depth + 1,
            segment: Some(segment.clone()),
            children: Vec::new(),
            queries: Vec::new(),
            leaf: None,
            is_port,
        });
        self.nodes[parent].children.push(child);
        child
    }

    /// Find the best-matching registration for a concrete input template.
    pub fn match_template<'a>(&'a self, input: &'a Template) -> Option<Match<'a, V>> {
        let mut status = Status::new();
        self.pick_matching_children(input.scheme(), &mut status);
        self.pick_matching_children(input.username(), &mut status);
        self.pick_matching_children(input.password(), &mut status);
        self.pick_matching_children(input.host(), &mut status);
        if input.host().is_some() {
            // Default ports are omitted from URLs, so a registered port
            // segment is satisfied by an input without one.
            self.pick_matching_optional_port(input.port(), &mut status);
        }
        for segment in input.path() {
            if status.candidates.is_empty() {
                break;
            }
            self.pick_matching_children(Some(segment), &mut status);
        }
        self.pick_matching_children(input.fragment(), &mut status);
        if status.candidates.is_empty() {
            return None;
        }
        self.pick_best_match(input, &status)
    }

    fn pick_matching_children<'a>(&'a self, segment: Option<&'a Segment>, status: &mut Status<'a>) {
        let Some(segment) = segment else {
            return;
        };
        let candidates = std::mem::take(&mut status.candidates);
        let mut next = Vec::new();
        for candidate in candidates {
            let node_id = status.entries[candidate].node;
            let node = &self.nodes[node_id];
            if node.has_glob() {
                // A glob stays a candidate and swallows this input segment too.
                let entry = status.push(MatchEntry {
                    parent: Some(candidate),
                    node: node_id,
                    template_segment: node.segment.as_ref(),
                    input_segment: Some(segment),
                });
                next.push(entry);
            }
            for &child in &node.children {
                let child_node = &self.nodes[child];
                let matches = child_node
                    .segment
                    .as_ref()
                    .map(|s| s.matches(segment))
                    .unwrap_or(false);
                if matches {
                    let entry = status.push(MatchEntry {
                        parent: Some(candidate),
                        node: child,
                        template_segment: child_node.segment.as_ref(),
                        input_segment: Some(segment),
                    });
                    next.push(entry);
                }
            }
        }
        status.candidates = next;
    }

    fn pick_matching_optional_port<'a>(
        &'a self,
        port: Option<&'a Segment>,
        status: &mut Status<'a>,
    ) {
        let candidates = std::mem::take(&mut status.candidates);
        let mut next = Vec::new();
        for candidate in candidates {
            let node_id = status.entries[candidate].node;
            match port {
                Some(segment) => {
                    for &child in &self.nodes[node_id].children {
                        let child_node = &self.nodes[child];
                        if child_node.is_port
                            && child_node
                                .segment
                                .as_ref()
                                .map(|s| s.matches(segment))
                                .unwrap_or(false)
                        {
                            let entry = status.push(MatchEntry {
                                parent: Some(candidate),
                                node: child,
                                template_segment: child_node.segment.as_ref(),
                                input_segment: Some(segment),
                            });
                            next.push(entry);
                        }
                    }
                }
                None => {
                    // Templates without a port stay as they are; templates
                    // with one advance past it binding nothing.
                    next.push(candidate);
                    for &child in &self.nodes[node_id].children {
                        let child_node = &self.nodes[child];
                        if child_node.is_port {
                            let entry = status.push(MatchEntry {
                                parent: Some(candidate),
                                node: child,
                                template_segment: child_node.segment.as_ref(),
                                input_segment: None,
                            });
                            next.push(entry);
                        }
                    }
                }
            }
        }
        status.candidates = next;
    }

    fn pick_best_match<'a>(
        &'a self,
        input: &'a Template,
        status: &Status<'a>,
    ) -> Option<Match<'a, V>> {
        let mut best_node: Option<usize> = None;
        let mut best_query: Option<usize> = None;
        let mut best_reg: Option<usize> = None;
        let mut best_entry: Option<usize> = None;
        for &candidate in &status.candidates {
            let node_id = status.entries[candidate].node;
            let node = &self.nodes[node_id];
            let better = match best_node {
                None => true,
                Some(best) => {
                    node.depth > self.nodes[best].depth
                        || (node.depth == self.nodes[best].depth
                            && node.kind_ordinal() < self.nodes[best].kind_ordinal())
                }
            };
            if !better {
                continue;
            }
            if let Some(reg) = node.leaf {
                best_node = Some(node_id);
                best_query = None;
                best_reg = Some(reg);
                best_entry = Some(candidate);
            }
            if !node.queries.is_empty() {
                if let Some(query_reg) = self.pick_best_query_match(input, node) {
                    best_node = Some(node_id);
                    best_query = Some(query_reg);
                    best_reg = Some(query_reg);
                    best_entry = Some(candidate);
                }
            }
        }
        let reg = best_reg?;
        let params = self.extract_params(input, status, best_entry?, best_query);
        let registration = &self.registrations[reg];
        Some(Match {
            template: &registration.template,
            value: &registration.value,
            params,
        })
    }

    fn pick_best_query_match(&self, input: &Template, node: &PathNode) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut best_count = 0;
        for &reg in &node.queries {
            let template = &self.registrations[reg].template;
            let declared = template.query().len();
            let count = Self::query_match_count(template, input);
            let matches_named = count >= declared;
            let matches_extra = match template.extra() {
                None => true,
                Some(extra) if extra.query_name() == GLOB_PATTERN => true,
                // A star extra must consume at least one undeclared parameter.
                Some(_) => input.query().len() > declared,
            };
            if (best.is_none() || count > best_count) && matches_named && matches_extra {
                best_count = count;
                best = Some(reg);
            }
        }
        best
    }

    /// Number of declared query parameters the input satisfies; zero if any
    /// declared parameter is missing or mismatched.
    fn query_match_count(template: &Template, input: &Template) -> usize {
        let mut count = 0;
        for segment in template.query().values() {
            match input.query().get(segment.query_name()) {
                Some(input_segment) if segment.matches(input_segment) => count += 1,
                _ => return 0,
            }
        }
        count
    }

    fn extract_params<'a>(
        &'a self,
        input: &'a Template,
        status: &Status<'a>,
        best_entry: usize,
        best_query: Option<usize>,
    ) -> MatchParams {
        let mut params = MatchParams::default();
        if let Some(reg) = best_query {
            let template = &self.registrations[reg].template;
            for segment in template.query().values() {
                if let Some(input_segment) = input.query().get(segment.query_name()) {
                    if segment.matches(input_segment) {
                        extract_segment_params(
                            Some(segment.segment()),
                            Some(input_segment.segment()),
                            &mut params,
                        );
                    }
                }
            }
            // Unclaimed input parameters flow into the extra bucket under
            // their own query names.
            if let Some(extra) = template.extra() {
                if !extra.param_name().is_empty() {
                    for input_segment in input.query().values() {
                        let name = input_segment.query_name();
                        if params.resolve(name).is_none() {
                            for value in input_segment.values() {
                                params.add_value(
                                    name,
                                    value.effective_pattern().unwrap_or("").to_string(),
                                );
                            }
                        }
                    }
                }
            }
        }
        let mut cursor = Some(best_entry);
        while let Some(index) = cursor {
            let entry = &status.entries[index];
            if self.nodes[entry.node].depth == 0 {
                break;
            }
            extract_segment_params(entry.template_segment, entry.input_segment, &mut params);
            cursor = entry.parent;
        }
        params
    }
}

/// Bind every value of the input segment to the template segment's parameter
/// name, prepending so a chain walked leaf-to-root restores input order.
fn extract_segment_params(
    template_segment: Option<&Segment>,
    input_segment: Option<&Segment>,
    params: &mut MatchParams,
) {
    let (Some(template_segment), Some(input_segment)) = (template_segment, input_segment) else {
        return;
    };
    let name = template_segment.param_name();
    if name.is_empty() {
        return;
    }
    for value in input_segment.values().iter().rev() {
        params.insert_value(name, value.effective_pattern().unwrap_or("").to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urltemplate::Parser;

    fn matcher(patterns: &[&str]) -> Matcher<String> {
        let mut matcher = Matcher::new();
        for pattern in patterns {
            matcher.add(Parser::parse(pattern).unwrap(), pattern.to_string());
        }
        matcher
    }

    fn best(matcher: &Matcher<String>, input: &str) -> Option<String> {
        let input = Parser::parse_literal(input).unwrap();
        matcher.match_template(&input).map(|m| m.value().clone())
    }

    #[test]
    fn test_static_beats_wildcard_beats_glob() {
        let m = matcher(&["/a/b", "/a/{x}", "/a/**"]);
        assert_eq!(best(&m, "/a/b").as_deref(), Some("/a/b"));
        assert_eq!(best(&m, "/a/c").as_deref(), Some("/a/{x}"));
        assert_eq!(best(&m, "/a/c/d").as_deref(), Some("/a/**"));
    }

    #[test]
    fn test_no_match_is_none() {
        let m = matcher(&["/a/b"]);
        assert!(best(&m, "/x/y").is_none());
        assert!(best(&m, "/a/b/c").is_none());
    }

    #[test]
    fn test_glob_binds_all_consumed_segments_in_order() {
        let m = matcher(&["/files/{p=**}"]);
        let input = Parser::parse_literal("/files/x/y/z").unwrap();
        let matched = m.match_template(&input).unwrap();
        assert_eq!(
            matched.params().resolve("p"),
            Some(vec!["x".to_string(), "y".to_string(), "z".to_string()])
        );
    }

    #[test]
    fn test_glob_matches_zero_trailing_segments() {
        let m = matcher(&["/top/**"]);
        assert!(best(&m, "/top/a").is_some());
        assert!(best(&m, "/top/a/b/c").is_some());
    }

    #[test]
    fn test_single_star_matches_exactly_one_segment() {
        let m = matcher(&["/a/{x=*}"]);
        assert!(best(&m, "/a/one").is_some());
        assert!(best(&m, "/a/one/two").is_none());
    }

    #[test]
    fn test_regex_segment() {
        let m = matcher(&["/data/{f=*.csv}"]);
        assert!(best(&m, "/data/report.csv").is_some());
        assert!(best(&m, "/data/report.json").is_none());
    }

    #[test]
    fn test_full_url_binding() {
        let m = matcher(&["{scheme}://{host}:{port}/{root}/{file}"]);
        let input = Parser::parse_literal("http://example.com:80/top/file.txt").unwrap();
        let matched = m.match_template(&input).unwrap();
        let params = matched.params();
        assert_eq!(params.resolve("scheme"), Some(vec!["http".to_string()]));
        assert_eq!(params.resolve("host"), Some(vec!["example.com".to_string()]));
        assert_eq!(params.resolve("port"), Some(vec!["80".to_string()]));
        assert_eq!(params.resolve("root"), Some(vec!["top".to_string()]));
        assert_eq!(params.resolve("file"), Some(vec!["file.txt".to_string()]));
    }

    #[test]
    fn test_port_is_optional_on_input() {
        let m = matcher(&["*://*:*/{path=*}"]);
        assert!(best(&m, "scheme://host").is_none());
        assert!(best(&m, "scheme://host/").is_none());
        assert!(best(&m, "scheme://host/path").is_some());
        assert!(best(&m, "scheme://host:42/path").is_some());
    }

    #[test]
    fn test_deeper_match_wins() {
        let m = matcher(&["/a/**", "/a/b/{x}"]);
        assert_eq!(best(&m, "/a/b/c").as_deref(), Some("/a/b/{x}"));
    }

    #[test]
    fn test_declared_query_params_must_match() {
        let m = matcher(&["/path?op={op=*}"]);
        assert!(best(&m, "/path?op=LIST").is_some());
        assert!(best(&m, "/path").is_none());
    }

    #[test]
    fn test_query_match_binds_params() {
        let m = matcher(&["/path?op={op=*}&{**}"]);
        let input = Parser::parse_literal("/path?op=OPEN&offset=42&length=7").unwrap();
        let matched = m.match_template(&input).unwrap();
        let params = matched.params();
        assert_eq!(params.resolve("op"), Some(vec!["OPEN".to_string()]));
        assert_eq!(params.resolve("offset"), Some(vec!["42".to_string()]));
        assert_eq!(params.resolve("length"), Some(vec!["7".to_string()]));
    }

    #[test]
    fn test_more_query_matches_beats_fewer() {
        let m = matcher(&["/path?a={a=*}", "/path?a={a=*}&b={b=*}"]);
        assert_eq!(
            best(&m, "/path?a=1&b=2").as_deref(),
            Some("/path?a={a=*}&b={b=*}")
        );
    }

    #[test]
    fn test_get_by_template() {
        let m = matcher(&["/a/b"]);
        let key = Parser::parse("/a/b").unwrap();
        assert_eq!(m.get(&key).map(String::as_str), Some("/a/b"));
    }

    #[test]
    fn test_empty_matcher_matches_nothing() {
        let m: Matcher<String> = Matcher::new();
        let input = Parser::parse_literal("/a").unwrap();
        assert!(m.match_template(&input).is_none());
    }
}
