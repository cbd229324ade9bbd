//! Pattern string → Template compilation.
//!
//! # Responsibilities
//! - Split a pattern into scheme/authority/path/query/fragment with one
//!   anchored regular expression
//! - Tokenize each piece (`{name}`, `{name=pattern}`, bare literal) with the
//!   positional default wildcard (path defaults to `**`, everything else `*`)
//! - Reinterpret `scheme:host:port`-shaped strings as authority-only templates
//!
//! # Design Decisions
//! - Two entry points: `parse` treats `{}` as markup, `parse_literal` treats
//!   the whole string as literal text (used for concrete request URLs)
//! - The top-level regex matches any string, so failures only arise from
//!   token-level errors (e.g. an unparsable wildcard pattern)

use crate::urltemplate::segment::{
    Token, ANONYMOUS_PARAM, GLOB_PATTERN, STAR_PATTERN,
};
use crate::urltemplate::template::{Builder, Template};
use crate::urltemplate::TemplateError;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/*
    ^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?
     12            3  4          5       6  7        8 9

    scheme    = $2
    authority = $4
    path      = $5
    query     = $7
    fragment  = $9
*/
static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?").unwrap()
});

/// Splits query strings on `?`, `&` and the `&amp;` entity (values that pass
/// through XML tooling frequently arrive entity-escaped).
static QUERY_DELIMITER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&amp;|\?|&").unwrap());

const TEMPLATE_OPEN_MARKUP: char = '{';
const TEMPLATE_CLOSE_MARKUP: char = '}';
const NAME_PATTERN_SEPARATOR: char = '=';

/// Compiles pattern strings into [`Template`]s.
pub struct Parser;

impl Parser {
    /// Parse a pattern string; `{...}` tokens are template markup.
    pub fn parse(template: &str) -> Result<Template, TemplateError> {
        parse_internal(template, false)
    }

    /// Parse a concrete URL; every token is a static literal.
    pub fn parse_literal(literal: &str) -> Result<Template, TemplateError> {
        parse_internal(literal, true)
    }
}

fn parse_internal(original: &str, literal: bool) -> Result<Template, TemplateError> {
    let captures = URL_REGEX
        .captures(original)
        .ok_or_else(|| TemplateError::malformed(original, "unrecognized url shape"))?;
    let mut builder = Builder::new(original);
    builder.set_literal(literal);
    consume_scheme(&mut builder, &captures)?;
    consume_authority(&mut builder, &captures)?;
    consume_path(&mut builder, &captures)?;
    consume_query(&mut builder, &captures)?;
    consume_fragment(&mut builder, &captures)?;
    fix_naked_authority(&mut builder, &captures)?;
    Ok(builder.build())
}

fn consume_scheme(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    if captures.get(1).is_some() {
        builder.set_has_scheme(true);
        if let Some(token) = captures.get(2) {
            let token = parse_token(token.as_str(), STAR_PATTERN, builder.is_literal());
            builder.set_scheme(token)?;
        }
    }
    Ok(())
}

fn consume_authority(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    if captures.get(3).is_none() {
        return Ok(());
    }
    builder.set_has_authority(true);
    let Some(authority) = captures.get(4) else {
        return Ok(());
    };
    let literal = builder.is_literal();
    let (user_info, host_port) = match authority.as_str().split_once('@') {
        Some((user_info, host_port)) => (Some(user_info), host_port),
        None => (None, authority.as_str()),
    };
    if let Some(user_info) = user_info {
        let (username, password) = match user_info.split_once(':') {
            Some((username, password)) => (username, Some(password)),
            None => (user_info, None),
        };
        if !username.is_empty() {
            builder.set_username(make_singular(parse_token(username, STAR_PATTERN, literal)))?;
        }
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            builder.set_password(make_singular(parse_token(password, STAR_PATTERN, literal)))?;
        }
    }
    let (host, port) = match host_port.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (host_port, None),
    };
    if !host.is_empty() {
        builder.set_host(make_singular(parse_token(host, STAR_PATTERN, literal)))?;
    }
    if let Some(port) = port.filter(|p| !p.is_empty()) {
        builder.set_port(make_singular(parse_token(port, STAR_PATTERN, literal)))?;
    }
    Ok(())
}

fn consume_path(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    let Some(path) = captures.get(5) else {
        return Ok(());
    };
    let path = path.as_str();
    builder.set_is_absolute(path.starts_with('/'));
    builder.set_is_directory(path.ends_with('/'));
    for piece in path.split('/').filter(|p| !p.is_empty()) {
        let token = parse_token(piece, GLOB_PATTERN, builder.is_literal());
        builder.add_path(token)?;
    }
    Ok(())
}

fn consume_query(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    if captures.get(6).is_none() {
        return Ok(());
    }
    builder.set_has_query(true);
    let Some(query) = captures.get(7) else {
        return Ok(());
    };
    for piece in QUERY_DELIMITER.split(query.as_str()).filter(|p| !p.is_empty()) {
        consume_query_segment(builder, piece)?;
    }
    Ok(())
}

fn consume_query_segment(builder: &mut Builder, piece: &str) -> Result<(), TemplateError> {
    let literal = builder.is_literal();
    // Shorthand: ?{queryParam} binds queryParam={queryParam=**}
    if piece.starts_with(TEMPLATE_OPEN_MARKUP) && !literal {
        let token = parse_token(piece, GLOB_PATTERN, literal);
        let param_name = token.param_name.clone();
        if token.original_pattern.is_none() {
            builder.add_query(
                &param_name,
                Token::new(param_name.clone(), None, Some(GLOB_PATTERN.to_string()), literal),
            )
        } else {
            builder.add_query(
                &param_name,
                Token::simple(param_name.clone(), token.original_pattern, literal),
            )
        }
    } else {
        match piece.split_once(NAME_PATTERN_SEPARATOR) {
            None => builder.add_query(piece, Token::new(ANONYMOUS_PARAM, None, None, literal)),
            Some((name, value)) => {
                let token = parse_token(value, GLOB_PATTERN, literal);
                builder.add_query(name, token)
            }
        }
    }
}

fn consume_fragment(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    if captures.get(8).is_none() {
        return Ok(());
    }
    builder.set_has_fragment(true);
    if let Some(fragment) = captures.get(9).filter(|m| !m.as_str().is_empty()) {
        let token = parse_token(fragment.as_str(), STAR_PATTERN, builder.is_literal());
        builder.set_fragment(token)?;
    }
    Ok(())
}

/// Reinterpret `scheme:port` and `scheme:host:port` shorthand (no `//`) as an
/// authority-only reference. `{host}:{port}` collapses the scheme token into
/// the host; `rpc:host1:1234` keeps the scheme and splits host from port.
fn fix_naked_authority(builder: &mut Builder, captures: &Captures<'_>) -> Result<(), TemplateError> {
    if !(builder.has_scheme()
        && !builder.has_authority()
        && !builder.is_absolute()
        && !builder.is_directory()
        && builder.path().len() == 1
        && !builder.has_query()
        && !builder.has_fragment())
    {
        return Ok(());
    }
    let literal = builder.is_literal();
    let raw_scheme = captures.get(2).map(|m| m.as_str()).unwrap_or("");
    let raw_path = captures.get(5).map(|m| m.as_str()).unwrap_or("");
    builder.remove_first_path();
    if let Some((host, port)) = raw_path.split_once(':') {
        builder.set_host(make_singular(parse_token(host, STAR_PATTERN, literal)))?;
        builder.set_port(make_singular(parse_token(port, STAR_PATTERN, literal)))?;
    } else {
        builder.set_has_scheme(false);
        builder.set_host(make_singular(parse_token(raw_scheme, STAR_PATTERN, literal)))?;
        builder.set_port(make_singular(parse_token(raw_path, STAR_PATTERN, literal)))?;
    }
    builder.set_is_authority_only(true);
    Ok(())
}

/// A naked host or port admits only a single value; coerce `**` to `*`.
fn make_singular(token: Token) -> Token {
    if token.effective_pattern.as_deref() == Some(GLOB_PATTERN) {
        Token::new(
            token.param_name,
            token.original_pattern,
            Some(STAR_PATTERN.to_string()),
            token.literal,
        )
    } else {
        token
    }
}

/// Parse one token: `{name}`, `{name=pattern}` or a bare literal. A bare
/// `{**}` stays a glob even without a name; other `{name}` tokens take the
/// positional default pattern.
fn parse_token(s: &str, default_effective: &str, literal: bool) -> Token {
    if !literal
        && s.len() > 2
        && s.starts_with(TEMPLATE_OPEN_MARKUP)
        && s.ends_with(TEMPLATE_CLOSE_MARKUP)
    {
        let inner = &s[1..s.len() - 1];
        match inner.find(NAME_PATTERN_SEPARATOR) {
            None => {
                let effective = if inner == GLOB_PATTERN {
                    GLOB_PATTERN
                } else {
                    default_effective
                };
                Token::new(inner, None, Some(effective.to_string()), literal)
            }
            Some(i) => {
                let name = &inner[..i];
                let pattern = &inner[i + 1..];
                Token::simple(name, Some(pattern.to_string()), literal)
            }
        }
    } else {
        Token::simple(ANONYMOUS_PARAM, Some(s.to_string()), literal)
    }
}
