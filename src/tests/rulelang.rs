use crate::rules::{format, parse, Atom, Rule};
use crate::RuleError;

fn m(key: &str, value: &str) -> Rule {
    Rule::matching(key, value)
}

#[test]
fn test_parse_match() {
    assert_eq!(parse("a=b").unwrap(), m("a", "b"));
    assert_eq!(parse("a==b").unwrap(), m("a", "b"));
    assert_eq!(parse("  a = b  ").unwrap(), m("a", "b"));
    assert_eq!(parse("a=*").unwrap(), Rule::match_key("a"));
    assert_eq!(parse("*=b").unwrap(), Rule::matching(Atom::Star, "b"));
    assert_eq!(parse("*=*").unwrap(), Rule::match_all());
    assert_eq!(parse("host=example.com").unwrap(), m("host", "example.com"));
}

#[test]
fn test_parse_non_match() {
    assert_eq!(parse("a!=b").unwrap(), Rule::non_matching("a", "b"));
    assert_eq!(parse("a != b").unwrap(), Rule::non_matching("a", "b"));
    assert_eq!(
        parse("a!=/b/").unwrap(),
        Rule::non_matching("a", Atom::regexp("b").unwrap())
    );
}

#[test]
fn test_parse_quoted_strings() {
    assert_eq!(parse(r#""a b""#).unwrap(), Rule::fuzzy("a b"));
    assert_eq!(parse(r#"a="x\ny""#).unwrap(), m("a", "x\ny"));
    assert_eq!(parse(r#""kä"=v"#).unwrap(), m("kä", "v"));
    assert_eq!(parse(r#"a="\"\\\/""#).unwrap(), m("a", "\"\\/"));
    assert_eq!(parse(r#""192.0.2.1""#).unwrap(), Rule::fuzzy("192.0.2.1"));
}

#[test]
fn test_parse_regexp() {
    assert_eq!(
        parse("/foo/i").unwrap(),
        Rule::fuzzy(Atom::regexp_ignore_case("foo").unwrap())
    );
    assert_eq!(
        parse("/foo/").unwrap(),
        Rule::fuzzy(Atom::regexp("foo").unwrap())
    );
    assert_eq!(
        parse(r"/a\/b/").unwrap(),
        Rule::fuzzy(Atom::regexp("a/b").unwrap())
    );
    assert_eq!(
        parse(r"url=/^https?:\/\//").unwrap(),
        Rule::matching("url", Atom::regexp("^https?://").unwrap())
    );
}

#[test]
fn test_parse_ip() {
    assert_eq!(
        parse("a in 192.0.2.0/24").unwrap(),
        Rule::matching("a", Atom::ip("192.0.2.0/24").unwrap())
    );
    assert_eq!(
        parse("a IN 192.0.2.0-192.0.2.10").unwrap(),
        Rule::matching("a", Atom::ip("192.0.2.0-192.0.2.10").unwrap())
    );
    assert_eq!(
        parse("a not in 2001:db8::/32").unwrap(),
        Rule::non_matching("a", Atom::ip("2001:db8::/32").unwrap())
    );
    assert_eq!(
        parse("192.0.2.1").unwrap(),
        Rule::fuzzy(Atom::ip("192.0.2.1").unwrap())
    );
    // an address followed by more text is a plain string
    assert_eq!(parse("192.0.2.1x").unwrap(), Rule::fuzzy("192.0.2.1x"));
    // IP text after `=` is a string, not a range
    assert_eq!(parse("ip=192.0.2.1").unwrap(), m("ip", "192.0.2.1"));
}

#[test]
fn test_parse_fuzzy() {
    assert_eq!(parse("a").unwrap(), Rule::fuzzy("a"));
    assert_eq!(parse("*").unwrap(), Rule::fuzzy(Atom::Star));
    assert_eq!(parse("and").unwrap(), Rule::fuzzy("and"));
    // a lone `no` is a plain string
    assert_eq!(parse("no").unwrap(), Rule::fuzzy("no"));
}

#[test]
fn test_parse_no() {
    assert_eq!(
        parse("no (a=b and c=d)").unwrap(),
        Rule::no(Rule::and([m("a", "b"), m("c", "d")]).unwrap())
    );
    assert_eq!(parse("no(a=b)").unwrap(), Rule::no(m("a", "b")));
    assert_eq!(parse("NO a=b").unwrap(), Rule::no(m("a", "b")));
    assert_eq!(
        parse("no no a").unwrap(),
        Rule::no(Rule::no(Rule::fuzzy("a")))
    );
    // `no` only reads as a keyword when followed by space or a parenthesis
    assert_eq!(parse("north=x").unwrap(), m("north", "x"));
    assert_eq!(parse("no=x").unwrap(), m("no", "x"));
}

#[test]
fn test_parse_connectives() {
    assert_eq!(
        parse("a=b and c=d").unwrap(),
        Rule::and([m("a", "b"), m("c", "d")]).unwrap()
    );
    assert_eq!(
        parse("a=b AND c=d").unwrap(),
        Rule::and([m("a", "b"), m("c", "d")]).unwrap()
    );
    assert_eq!(
        parse("a=b or c=d or e=f").unwrap(),
        Rule::or([m("a", "b"), m("c", "d"), m("e", "f")]).unwrap()
    );
    assert_eq!(
        parse("(a=b) and (c=d)").unwrap(),
        Rule::and([m("a", "b"), m("c", "d")]).unwrap()
    );
    assert_eq!(
        parse("(a=b)and(c=d)").unwrap(),
        Rule::and([m("a", "b"), m("c", "d")]).unwrap()
    );
    assert_eq!(
        parse("a=b and no c=d").unwrap(),
        Rule::and([m("a", "b"), Rule::no(m("c", "d"))]).unwrap()
    );
    assert_eq!(parse("(a=b)").unwrap(), m("a", "b"));
    assert_eq!(parse("((a=b))").unwrap(), m("a", "b"));
}

#[test]
fn test_parse_nested() {
    assert_eq!(
        parse("host=example.com and (asn=1234 or no ip in 192.0.2.0/24)").unwrap(),
        Rule::and([
            m("host", "example.com"),
            Rule::or([
                m("asn", "1234"),
                Rule::no(Rule::matching("ip", Atom::ip("192.0.2.0/24").unwrap())),
            ])
            .unwrap(),
        ])
        .unwrap()
    );
}

#[test]
fn test_trailing_operand_is_a_full_expression() {
    assert_eq!(
        parse("a and b or c").unwrap(),
        Rule::and([
            Rule::fuzzy("a"),
            Rule::or([Rule::fuzzy("b"), Rule::fuzzy("c")]).unwrap(),
        ])
        .unwrap()
    );
}

#[test]
fn test_syntax_errors() {
    for text in [
        "",
        "   ",
        "a=",
        "a b",
        "(a=b",
        "a=b)",
        "a=b and",
        "and a=b",
        r#"a="unterminated"#,
        r#"a="bad \x escape""#,
        "/unterminated",
        "/foo/ix",
        "a=/[/",
        "a in 300.1.1.1",
        "a in example.com",
        "192.0.2.1=b",
        "a=b or",
    ] {
        match parse(text) {
            Err(RuleError::Syntax(source)) => assert_eq!(source, text),
            other => panic!("{:?} parsed as {:?}", text, other),
        }
    }
}

#[test]
fn test_display() {
    let rule = Rule::or([m("a", "b"), Rule::no(Rule::fuzzy("c d"))]).unwrap();
    let text = rule.to_string();
    assert_eq!(text, rule.to_text().unwrap());
    assert_eq!(text.parse::<Rule>().unwrap(), rule);

    let mut out = String::new();
    let unformattable = Rule::matching(Atom::regexp("a").unwrap(), "b");
    assert!(std::fmt::write(&mut out, format_args!("{}", unformattable)).is_err());
}

#[test]
fn test_from_str() {
    assert_eq!("a=b".parse::<Rule>().unwrap(), m("a", "b"));
    assert_eq!(Rule::try_from("a!=b").unwrap(), Rule::non_matching("a", "b"));
    assert!("a=".parse::<Rule>().is_err());
}

#[test]
fn test_format() {
    assert_eq!(format(&m("a", "b")).unwrap(), "a=b");
    assert_eq!(format(&Rule::fuzzy("a b")).unwrap(), r#""a b""#);
    assert_eq!(format(&Rule::fuzzy("")).unwrap(), r#""""#);
    assert_eq!(format(&Rule::fuzzy("192.0.2.1")).unwrap(), r#""192.0.2.1""#);
    assert_eq!(format(&Rule::match_all()).unwrap(), "*=*");
    assert_eq!(
        format(&Rule::non_matching("a", Atom::ip("192.0.2.0/24").unwrap())).unwrap(),
        "a not in 192.0.2.0/24"
    );
    assert_eq!(
        format(&Rule::and([m("a", "b"), m("c", "d")]).unwrap()).unwrap(),
        "(a=b) and (c=d)"
    );
    assert_eq!(
        format(&Rule::no(Rule::and([m("a", "b"), m("c", "d")]).unwrap())).unwrap(),
        "no ((a=b) and (c=d))"
    );
    assert_eq!(format(&Rule::no(m("a", "b"))).unwrap(), "no a=b");
    assert_eq!(
        format(&Rule::or([m("a", "b")]).unwrap()).unwrap(),
        "(a=b) or (a=b)"
    );
}

#[test]
fn test_format_escapes_slashes() {
    let text = format(&Rule::matching("a", Atom::regexp("a/b").unwrap())).unwrap();
    assert_eq!(text, r"a=/a\/b/");

    let text = format(&Rule::fuzzy(Atom::regexp_ignore_case(r"\\/").unwrap())).unwrap();
    assert_eq!(text, r"/\\\//i");
}

#[test]
fn test_format_unformattable() {
    let rule = Rule::matching(Atom::regexp("a").unwrap(), "b");
    assert!(matches!(format(&rule), Err(RuleError::Unformattable(_))));

    let rule = Rule::and([
        Rule::fuzzy("x"),
        Rule::non_matching(Atom::ip("192.0.2.1").unwrap(), "b"),
    ])
    .unwrap();
    assert!(matches!(format(&rule), Err(RuleError::Unformattable(_))));
}

#[test]
fn test_format_parse_round_trip() {
    let ip = || Atom::ip("192.0.2.0/24").unwrap();
    let rules = vec![
        Rule::match_all(),
        m("a", "b"),
        m("a b", "c\"d"),
        m("A", "B"),
        Rule::match_key("no"),
        Rule::matching("no", ip()),
        Rule::non_matching("no", ip()),
        Rule::matching("a", Atom::regexp("a/b").unwrap()),
        Rule::matching("a", Atom::regexp(r"\\/").unwrap()),
        Rule::matching("a", Atom::regexp_ignore_case("x\ny").unwrap()),
        Rule::matching("a", ip()),
        Rule::matching(Atom::Star, ip()),
        Rule::non_matching("a", "b"),
        Rule::non_matching("a", Atom::Star),
        Rule::non_matching("a", ip()),
        Rule::fuzzy("a"),
        Rule::fuzzy("no"),
        Rule::fuzzy("and"),
        Rule::fuzzy(""),
        Rule::fuzzy("192.0.2.1"),
        Rule::fuzzy("tab\there"),
        Rule::fuzzy(Atom::Star),
        Rule::fuzzy(ip()),
        Rule::fuzzy(Atom::ip("2001:db8::1-2001:db8::5").unwrap()),
        Rule::fuzzy(Atom::regexp("").unwrap()),
        Rule::and([m("a", "b")]).unwrap(),
        Rule::and([m("a", "b"), Rule::fuzzy("or")]).unwrap(),
        Rule::or([
            m("a", "b"),
            Rule::and([m("c", "d"), Rule::no(m("e", "f"))]).unwrap(),
        ])
        .unwrap(),
        Rule::no(Rule::and([m("a", "b"), m("c", "d")]).unwrap()),
        Rule::no(Rule::no(Rule::fuzzy("a"))),
        Rule::no(Rule::fuzzy(Atom::regexp("x").unwrap())),
        Rule::no(Rule::fuzzy(ip())),
        Rule::and([
            Rule::or([m("a", "b"), m("c", "d")]).unwrap(),
            Rule::or([m("e", "f"), Rule::no(Rule::match_key("g"))]).unwrap(),
        ])
        .unwrap(),
    ];

    for rule in rules {
        let text = format(&rule).unwrap();
        assert_eq!(parse(&text).unwrap(), rule, "{}", text);
        assert_eq!(Rule::parse(&rule.to_text().unwrap()).unwrap(), rule);
    }
}

#[test]
fn test_format_deep_rule_does_not_recurse() {
    let depth = 100_000;
    let mut rule = Rule::fuzzy("a");
    for _ in 0..depth {
        rule = Rule::no(rule);
    }

    let text = format(&rule).unwrap();
    assert_eq!(text.len(), "no ".len() * depth + 1);
    assert!(text.starts_with("no no no "));
    assert!(text.ends_with("no a"));
}

#[test]
fn test_atom_display() {
    assert_eq!(Atom::Star.to_string(), "*");
    assert_eq!(Atom::string("a").to_string(), "a");
    assert_eq!(Atom::string("a=b").to_string(), r#""a=b""#);
    assert_eq!(Atom::regexp_ignore_case("x").unwrap().to_string(), "/x/i");
    assert_eq!(Atom::ip("192.0.2.0/24").unwrap().to_string(), "192.0.2.0/24");
}
