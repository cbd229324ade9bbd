//! Behavioral properties of the URL template engine, exercised through the
//! public API the gateway itself uses.

use rewrite_gateway::urltemplate::expander::{Expander, MapParams, Params};
use rewrite_gateway::urltemplate::{Matcher, Parser};

/// parse ∘ serialize is idempotent: re-parsing a template's image yields a
/// structurally equal template with a stable image.
#[test]
fn round_trip_law() {
    let patterns = [
        "",
        "/",
        "/path",
        "path/",
        "/a/{b}/{c=*}/{d=**}",
        "{scheme}://{host}:{port}/{path=**}?{**}",
        "http://host:8080/webhdfs/v1/tmp?op=LIST#frag",
        "*://*:*/**",
        "//{host}:{port}",
        "rpc:host1:1234",
        "?{token}",
        "/p?name={p=*}&flag",
    ];
    for pattern in patterns {
        let template = Parser::parse(pattern).unwrap();
        let image = template.to_string();
        let reparsed = Parser::parse(&image).unwrap();
        assert_eq!(template, reparsed, "round trip failed for '{}'", pattern);
        assert_eq!(image, reparsed.to_string());
    }
}

/// The most specific registration wins at every position.
#[test]
fn specificity_ordering() {
    let mut matcher = Matcher::new();
    for pattern in ["/a/b", "/a/{x}", "/a/**"] {
        matcher.add(Parser::parse(pattern).unwrap(), pattern.to_string());
    }
    let select = |url: &str| {
        let input = Parser::parse_literal(url).unwrap();
        matcher
            .match_template(&input)
            .map(|m| m.value().clone())
            .unwrap()
    };
    assert_eq!(select("/a/b"), "/a/b");
    assert_eq!(select("/a/c"), "/a/{x}");
    assert_eq!(select("/a/c/d"), "/a/**");
}

/// A glob binds every consumed path element, and expansion reproduces the
/// original path.
#[test]
fn glob_consumption_round_trip() {
    let template = Parser::parse("/files/{p=**}").unwrap();
    let mut matcher = Matcher::new();
    matcher.add(template.clone(), ());
    let input = Parser::parse_literal("/files/x/y/z").unwrap();
    let params = matcher.match_template(&input).unwrap().into_params();
    assert_eq!(
        params.resolve("p"),
        Some(vec!["x".to_string(), "y".to_string(), "z".to_string()])
    );
    assert_eq!(Expander::expand_to_string(&template, &params, None), "/files/x/y/z");
}

/// `?{token}` is shorthand for `?token={token=**}`: both match and bind the
/// same way.
#[test]
fn query_shorthand_equivalence() {
    let input = Parser::parse_literal("/p?token=abc").unwrap();
    for pattern in ["/p?{token}", "/p?token={token=**}"] {
        let mut matcher = Matcher::new();
        matcher.add(Parser::parse(pattern).unwrap(), ());
        let params = matcher.match_template(&input).unwrap().into_params();
        assert_eq!(
            params.resolve("token"),
            Some(vec!["abc".to_string()]),
            "pattern '{}'",
            pattern
        );
    }
}

/// `scheme:host:port` shorthand is an authority-only reference.
#[test]
fn naked_authority() {
    let template = Parser::parse("rpc:host1:1234").unwrap();
    assert!(template.is_authority_only());
    assert!(template.path().is_empty());
    assert_eq!(
        template.host().unwrap().first_value().original_pattern(),
        Some("host1")
    );
    assert_eq!(
        template.port().unwrap().first_value().original_pattern(),
        Some("1234")
    );
}

/// The documented webhdfs expansion: unresolved static-default port, resolved
/// host.
#[test]
fn webhdfs_expansion() {
    let template = Parser::parse("http://{host}:{port=50070}/webhdfs").unwrap();
    let mut params = MapParams::default();
    params.insert_value("host", "nn1.example.com");
    assert_eq!(
        Expander::expand_to_string(&template, &params, None),
        "http://nn1.example.com:50070/webhdfs"
    );
}

/// Unmodeled query parameters pass through the extra bucket exactly once.
#[test]
fn extra_query_passthrough() {
    let inbound = Parser::parse("/webhdfs/{version}/{path=**}?{**}").unwrap();
    let mut matcher = Matcher::new();
    matcher.add(inbound, ());
    let input = Parser::parse_literal("/webhdfs/v1/tmp/f?op=OPEN&offset=1024").unwrap();
    let params = matcher.match_template(&input).unwrap().into_params();

    let outbound = Parser::parse("http://nn:50070/webhdfs/{version}/{path=**}?{**}").unwrap();
    assert_eq!(
        Expander::expand_to_string(&outbound, &params, None),
        "http://nn:50070/webhdfs/v1/tmp/f?op=OPEN&offset=1024"
    );
}
