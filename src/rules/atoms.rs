//! Leaf values of the rule language.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::IpAddr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::iprange::IpRange;
use crate::error::{Result, RuleError};

/// A compiled regular expression compared by its source pattern.
///
/// Matching is an unanchored search. Slashes escaped as `\/` are stored
/// unescaped, so both spellings of a pattern are equal.
#[derive(Clone)]
pub struct RegExp {
    pattern: String,
    ignore_case: bool,
    compiled: Regex,
}

impl RegExp {
    pub fn new(pattern: &str, ignore_case: bool) -> Result<Self> {
        let pattern = unescape_slashes(pattern);
        let compiled = RegexBuilder::new(&pattern)
            .case_insensitive(ignore_case)
            .build()?;
        Ok(RegExp {
            pattern,
            ignore_case,
            compiled,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.compiled.is_match(candidate)
    }
}

/// Replaces every unescaped `\/` with `/`, leaving other escapes alone.
pub(crate) fn unescape_slashes(pattern: &str) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('/') => result.push('/'),
            Some(next) => {
                result.push('\\');
                result.push(next);
            }
            None => result.push('\\'),
        }
    }
    result
}

impl TryFrom<Regex> for RegExp {
    type Error = RuleError;

    /// Rebuilds the expression from its source text. Builder options such as
    /// case folding are not part of the text and are dropped; use `(?i)` or
    /// [`RegExp::new`] instead.
    fn try_from(regex: Regex) -> Result<Self> {
        RegExp::new(regex.as_str(), false)
    }
}

impl PartialEq for RegExp {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.ignore_case == other.ignore_case
    }
}

impl Eq for RegExp {}

impl Hash for RegExp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
        self.ignore_case.hash(state);
    }
}

impl PartialOrd for RegExp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RegExp {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.pattern, self.ignore_case).cmp(&(&other.pattern, other.ignore_case))
    }
}

impl fmt::Debug for RegExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegExp")
            .field("pattern", &self.pattern)
            .field("ignore_case", &self.ignore_case)
            .finish()
    }
}

impl Serialize for RegExp {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct RegExpHelper<'a> {
            pattern: &'a str,
            ignore_case: bool,
        }

        RegExpHelper {
            pattern: &self.pattern,
            ignore_case: self.ignore_case,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RegExp {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RegExpHelper {
            pattern: String,
            #[serde(default)]
            ignore_case: bool,
        }

        let helper = RegExpHelper::deserialize(deserializer)?;
        RegExp::new(&helper.pattern, helper.ignore_case).map_err(serde::de::Error::custom)
    }
}

/// A leaf value tested against event attribute names and values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atom {
    /// Exact text, compared case-insensitively.
    String(String),
    RegExp(RegExp),
    Ip(IpRange),
    /// Matches anything.
    #[default]
    Star,
}

impl Atom {
    pub fn string(value: impl Into<String>) -> Self {
        Atom::String(value.into())
    }

    pub fn regexp(pattern: &str) -> Result<Self> {
        RegExp::new(pattern, false).map(Atom::RegExp)
    }

    pub fn regexp_ignore_case(pattern: &str) -> Result<Self> {
        RegExp::new(pattern, true).map(Atom::RegExp)
    }

    /// Parses an address, a CIDR block or a `first-last` range.
    pub fn ip(text: &str) -> Result<Self> {
        text.parse::<IpRange>().map(Atom::Ip)
    }

    /// Tests a candidate name or value.
    pub fn is_match(&self, candidate: &str) -> bool {
        match self {
            Atom::String(value) => value
                .chars()
                .flat_map(char::to_lowercase)
                .eq(candidate.chars().flat_map(char::to_lowercase)),
            Atom::RegExp(regexp) => regexp.is_match(candidate),
            Atom::Ip(range) => range.matches(candidate),
            Atom::Star => true,
        }
    }

    /// Like [`Atom::is_match`], except that strings match any candidate
    /// containing them, ignoring case.
    pub fn is_fuzzy_match(&self, candidate: &str) -> bool {
        match self {
            Atom::String(value) => candidate.to_lowercase().contains(&value.to_lowercase()),
            other => other.is_match(candidate),
        }
    }
}

impl From<&str> for Atom {
    fn from(value: &str) -> Self {
        Atom::String(value.to_string())
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Atom::String(value)
    }
}

impl From<&String> for Atom {
    fn from(value: &String) -> Self {
        Atom::String(value.clone())
    }
}

impl TryFrom<Regex> for Atom {
    type Error = RuleError;

    fn try_from(regex: Regex) -> Result<Self> {
        RegExp::try_from(regex).map(Atom::RegExp)
    }
}

impl From<RegExp> for Atom {
    fn from(regexp: RegExp) -> Self {
        Atom::RegExp(regexp)
    }
}

impl From<IpRange> for Atom {
    fn from(range: IpRange) -> Self {
        Atom::Ip(range)
    }
}

impl From<IpAddr> for Atom {
    fn from(addr: IpAddr) -> Self {
        Atom::Ip(addr.into())
    }
}

impl From<cidr::IpCidr> for Atom {
    fn from(network: cidr::IpCidr) -> Self {
        Atom::Ip(network.into())
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::formatter::format_atom(self))
    }
}
