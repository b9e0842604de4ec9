//! Renders rules and atoms back to rule-language text.
//!
//! Rendering walks an explicit work stack instead of recursing, so
//! arbitrarily deep programmatic rules format without exhausting the
//! call stack. For every formattable rule `r`, `parse(format(r)) == r`.

use std::str::FromStr;

use serde_json::Value;

use super::atoms::{Atom, RegExp};
use super::iprange::IpRange;
use super::rule::{Rule, Subrules};
use super::rulelang::is_unquoted;
use crate::error::{Result, RuleError};

enum Frame<'a> {
    Rule(&'a Rule),
    Atom(&'a Atom),
    Text(&'static str),
}

/// Formats `rule` as rule-language text.
///
/// Fails for rules the grammar can not express: `Match` and `NonMatch`
/// keyed by a regular expression or an IP range.
pub fn format(rule: &Rule) -> Result<String> {
    let mut out = String::new();
    let mut stack = vec![Frame::Rule(rule)];

    while let Some(frame) = stack.pop() {
        let rule = match frame {
            Frame::Text(text) => {
                out.push_str(text);
                continue;
            }
            Frame::Atom(atom) => {
                out.push_str(&format_atom(atom));
                continue;
            }
            Frame::Rule(rule) => rule,
        };

        // frames are popped in reverse
        let mut frames = Vec::new();
        match rule {
            Rule::Match { key, value } => {
                check_key(rule, key)?;
                frames.push(Frame::Atom(key));
                frames.push(Frame::Text(match value {
                    Atom::Ip(_) => " in ",
                    _ => "=",
                }));
                frames.push(Frame::Atom(value));
            }
            Rule::NonMatch { key, value } => {
                check_key(rule, key)?;
                frames.push(Frame::Atom(key));
                frames.push(Frame::Text(match value {
                    Atom::Ip(_) => " not in ",
                    _ => "!=",
                }));
                frames.push(Frame::Atom(value));
            }
            Rule::Fuzzy(atom) => frames.push(Frame::Atom(atom)),
            Rule::And(subrules) => connective(&mut frames, subrules, " and "),
            Rule::Or(subrules) => connective(&mut frames, subrules, " or "),
            Rule::No(subrule) => {
                frames.push(Frame::Text("no "));
                match subrule.as_ref() {
                    Rule::And(_) | Rule::Or(_) => {
                        frames.push(Frame::Text("("));
                        frames.push(Frame::Rule(subrule.as_ref()));
                        frames.push(Frame::Text(")"));
                    }
                    _ => frames.push(Frame::Rule(subrule.as_ref())),
                }
            }
        }
        stack.extend(frames.into_iter().rev());
    }

    Ok(out)
}

fn check_key(rule: &Rule, key: &Atom) -> Result<()> {
    match key {
        Atom::String(_) | Atom::Star => Ok(()),
        Atom::RegExp(_) | Atom::Ip(_) => Err(RuleError::Unformattable(format!("{:?}", rule))),
    }
}

/// Every operand is parenthesized. A lone operand is written twice so the
/// text still reads as a connective; the duplicate collapses on parse.
fn connective<'a>(frames: &mut Vec<Frame<'a>>, subrules: &'a Subrules, keyword: &'static str) {
    let operands: Vec<&Rule> = match subrules.len() {
        1 => subrules.iter().chain(subrules.iter()).collect(),
        _ => subrules.iter().collect(),
    };
    for (index, operand) in operands.into_iter().enumerate() {
        if index != 0 {
            frames.push(Frame::Text(keyword));
        }
        frames.push(Frame::Text("("));
        frames.push(Frame::Rule(operand));
        frames.push(Frame::Text(")"));
    }
}

pub fn format_atom(atom: &Atom) -> String {
    match atom {
        Atom::String(value) => format_string(value),
        Atom::RegExp(regexp) => format_regexp(regexp),
        Atom::Ip(range) => range.to_string(),
        Atom::Star => "*".to_string(),
    }
}

/// Bare text when it lexes back to the same string, JSON-quoted otherwise.
///
/// Text that would read as an IP literal, or as the `no` keyword in front
/// of an `in` tail, is always quoted.
fn format_string(value: &str) -> String {
    let bare = is_unquoted(value)
        && IpRange::from_str(value).is_err()
        && !value.eq_ignore_ascii_case("no");
    if bare {
        value.to_string()
    } else {
        Value::String(value.to_string()).to_string()
    }
}

fn format_regexp(regexp: &RegExp) -> String {
    let mut result = String::with_capacity(regexp.pattern().len() + 3);
    result.push('/');

    let mut chars = regexp.pattern().chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                result.push('\\');
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            }
            '/' => result.push_str("\\/"),
            c => result.push(c),
        }
    }

    result.push('/');
    if regexp.ignore_case() {
        result.push('i');
    }
    result
}
