//! The rule-language grammar.
//!
//! ```text
//! host=example.com and (asn=1234 or no ip in 192.0.2.0/24)
//! ```
//!
//! Keywords (`and`, `or`, `no`, `in`, `not in`) are case-insensitive. The
//! last operand of an `and`/`or` chain is a full expression, so
//! `a and b or c` reads as `a and (b or c)`; the formatter always
//! parenthesizes operands and never relies on this.

use regex::Regex;

use super::atoms::{Atom, RegExp};
use super::iprange::IpRange;
use super::parsing::{
    delimited, epsilon, forward_ref, maybe, preceded, regex, repeat, seq, seq3, step, terminated,
    transform, try_transform, txt, txt_ignore_case, union, Cursor, Parser,
};
use super::rule::Rule;
use crate::error::{Result, RuleError};

lazy_static::lazy_static! {
    static ref WS: Regex = Regex::new(r"^[ \t\n\r]+").unwrap();
    static ref UNQUOTED: Regex = Regex::new(r#"^[^\s\\()"*!=/]+"#).unwrap();
    static ref QUOTED: Regex =
        Regex::new(r#"^"(?:\\u[0-9a-fA-F]{4}|\\[\\"/fbnrt]|[^\\"])*""#).unwrap();
    static ref REGEXP: Regex = Regex::new(r"(?s)^/((?:\\.|[^\\/])*)/(i)?").unwrap();
    static ref EXPR: Parser<Rule> = grammar();
}

/// Parses rule-language text. The whole input must form one expression.
pub fn parse(text: &str) -> Result<Rule> {
    EXPR.parse_all(text).ok_or_else(|| {
        log::debug!("could not parse rule {:?}", text);
        RuleError::Syntax(text.to_string())
    })
}

/// The expression parser, for embedding rules in larger grammars.
pub fn parser() -> Parser<Rule> {
    EXPR.clone()
}

/// Whether `value` is a single unquoted string token.
pub(crate) fn is_unquoted(value: &str) -> bool {
    UNQUOTED
        .find(value)
        .map_or(false, |token| token.end() == value.len())
}

fn ws() -> Parser<()> {
    regex(&WS).map(|_| ())
}

/// A JSON-style quoted string or a bare token.
fn string() -> Parser<Atom> {
    let quoted = try_transform(
        |text: String| serde_json::from_str::<String>(&text).ok().map(Atom::String),
        regex(&QUOTED),
    );
    let unquoted = regex(&UNQUOTED).map(Atom::String);
    union(vec![quoted, unquoted])
}

/// `/pattern/` or `/pattern/i`.
fn regexp() -> Parser<Atom> {
    Parser::new(|cursor: Cursor<'_>| {
        let captures = REGEXP.captures(cursor.rest())?;
        let end = captures.get(0)?.end();
        let ignore_case = captures.get(2).is_some();
        let regexp = RegExp::new(captures.get(1)?.as_str(), ignore_case)
            .map_err(|e| log::debug!("rejected regular expression: {}", e))
            .ok()?;
        Some((Atom::RegExp(regexp), cursor.advance(end)))
    })
}

fn star() -> Parser<Atom> {
    preceded(txt("*"), epsilon(Atom::Star))
}

fn ip() -> Parser<Atom> {
    IpRange::parser().map(Atom::Ip)
}

fn grammar() -> Parser<Rule> {
    let expr = forward_ref::<Rule>();
    let parens_expr = delimited(txt("("), expr.parser(), txt(")"));

    let value = || union(vec![star(), regexp(), string()]);

    let match_tail = union(vec![
        preceded(
            seq3(maybe(ws()), txt("="), maybe(txt("="))),
            preceded(maybe(ws()), value()),
        ),
        preceded(seq3(ws(), txt_ignore_case("in"), ws()), ip()),
    ]);

    let non_match_tail = union(vec![
        preceded(seq3(maybe(ws()), txt("!="), maybe(ws())), value()),
        preceded(
            seq3(ws(), txt_ignore_case("not"), ws()),
            preceded(seq(txt_ignore_case("in"), ws()), ip()),
        ),
    ]);

    // regexp and IP literals can not be keys
    let basic = union(vec![
        step(star())
            .tail(match_tail.clone(), |key, value| Rule::Match { key, value })
            .tail(non_match_tail.clone(), |key, value| Rule::NonMatch { key, value })
            .default(Rule::Fuzzy),
        union(vec![regexp(), ip()]).map(Rule::Fuzzy),
        step(string())
            .tail(match_tail, |key, value| Rule::Match { key, value })
            .tail(non_match_tail, |key, value| Rule::NonMatch { key, value })
            .default(Rule::Fuzzy),
    ]);

    let no_rule = forward_ref::<Rule>();
    let unary = union(vec![no_rule.parser(), basic]);
    no_rule.bind(transform(
        Rule::no,
        preceded(
            txt_ignore_case("no"),
            union(vec![
                preceded(maybe(ws()), parens_expr.clone()),
                preceded(ws(), unary.clone()),
            ]),
        ),
    ));

    // keyword, then `operand keyword` pairs, then a final operand that may
    // itself be any expression
    let connective_tail = |keyword: &'static str| {
        let operand = union(vec![
            delimited(maybe(ws()), parens_expr.clone(), maybe(ws())),
            delimited(ws(), unary.clone(), ws()),
        ]);
        let last = union(vec![parens_expr.clone(), preceded(ws(), expr.parser())]);
        seq3(
            txt_ignore_case(keyword),
            repeat(terminated(operand, txt_ignore_case(keyword))),
            last,
        )
        .map(|(_, mut operands, last)| {
            operands.push(last);
            operands
        })
    };
    let and_tail = connective_tail("and");
    let or_tail = connective_tail("or");

    let root = expr.parser();
    expr.bind(delimited(
        maybe(ws()),
        union(vec![
            step(parens_expr)
                .tail(preceded(maybe(ws()), and_tail.clone()), Rule::and_of)
                .tail(preceded(maybe(ws()), or_tail.clone()), Rule::or_of)
                .default(|rule| rule),
            step(unary)
                .tail(preceded(ws(), and_tail), Rule::and_of)
                .tail(preceded(ws(), or_tail), Rule::or_of)
                .default(|rule| rule),
        ]),
        maybe(ws()),
    ));
    root
}
