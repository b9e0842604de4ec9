//! Rule expressions and their evaluation against events.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{de, Deserialize, Deserializer, Serialize};

use super::atoms::Atom;
use crate::error::{Result, RuleError};
use crate::event::Event;

/// The operands of an `And` or `Or`: a non-empty set of rules.
///
/// Being a set, duplicates collapse and order is irrelevant, which makes
/// both connectives commutative and idempotent under `==` and `Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Subrules(Arc<BTreeSet<Rule>>);

impl Subrules {
    fn new(op: &'static str, rules: impl IntoIterator<Item = Rule>) -> Result<Self> {
        let rules: BTreeSet<Rule> = rules.into_iter().collect();
        if rules.is_empty() {
            return Err(RuleError::EmptyOperands(op));
        }
        Ok(Subrules(Arc::new(rules)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Subrules {
    type Item = &'a Rule;
    type IntoIter = std::collections::btree_set::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for Subrules {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rules = Vec::<Rule>::deserialize(deserializer)?;
        Subrules::new("subrule set", rules).map_err(de::Error::custom)
    }
}

/// A boolean expression over event attributes.
///
/// Rules are immutable values with structural equality. Cloning is cheap
/// and shares the operands, so one rule can appear in many larger rules.
///
/// Formatting and dropping work on rules of any depth. Matching, comparing
/// and hashing recurse once per nesting level, so rules built in code
/// should stay within a few thousand levels.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Some attribute named like `key` has a value matching `value`.
    Match { key: Atom, value: Atom },
    /// No attribute named like `key` has a value matching `value`.
    NonMatch { key: Atom, value: Atom },
    /// Some attribute name or value matches the atom.
    Fuzzy(Atom),
    And(Subrules),
    Or(Subrules),
    No(Arc<Rule>),
}

impl Rule {
    pub fn matching(key: impl Into<Atom>, value: impl Into<Atom>) -> Self {
        Rule::Match {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn non_matching(key: impl Into<Atom>, value: impl Into<Atom>) -> Self {
        Rule::NonMatch {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `Match(key, *)`: the event has the attribute at all.
    pub fn match_key(key: impl Into<Atom>) -> Self {
        Rule::matching(key, Atom::Star)
    }

    /// `Match(*, *)`: true for every non-empty event.
    pub fn match_all() -> Self {
        Rule::matching(Atom::Star, Atom::Star)
    }

    pub fn fuzzy(atom: impl Into<Atom>) -> Self {
        Rule::Fuzzy(atom.into())
    }

    /// Conjunction of `rules`. Fails when `rules` is empty.
    pub fn and(rules: impl IntoIterator<Item = Rule>) -> Result<Self> {
        Subrules::new("And", rules).map(Rule::And)
    }

    /// Disjunction of `rules`. Fails when `rules` is empty.
    pub fn or(rules: impl IntoIterator<Item = Rule>) -> Result<Self> {
        Subrules::new("Or", rules).map(Rule::Or)
    }

    pub fn no(rule: Rule) -> Self {
        Rule::No(Arc::new(rule))
    }

    /// Infallible variants of [`Rule::and`] and [`Rule::or`] for callers
    /// that always hold at least one operand.
    pub(crate) fn and_of(first: Rule, rest: Vec<Rule>) -> Self {
        let rules: BTreeSet<Rule> = std::iter::once(first).chain(rest).collect();
        Rule::And(Subrules(Arc::new(rules)))
    }

    pub(crate) fn or_of(first: Rule, rest: Vec<Rule>) -> Self {
        let rules: BTreeSet<Rule> = std::iter::once(first).chain(rest).collect();
        Rule::Or(Subrules(Arc::new(rules)))
    }

    /// Parses rule-language text.
    pub fn parse(text: &str) -> Result<Self> {
        super::rulelang::parse(text)
    }

    /// Renders the rule as rule-language text.
    pub fn to_text(&self) -> Result<String> {
        super::formatter::format(self)
    }

    /// Evaluates the rule against `event`.
    pub fn is_match(&self, event: &Event) -> bool {
        self.eval(event, None)
    }

    /// Evaluates the rule against `event`, memoizing every sub-rule result
    /// in `cache`. A sub-rule shared by several branches is evaluated once.
    ///
    /// The cache holds results for one event only; use a fresh one per event.
    pub fn is_match_with_cache(&self, event: &Event, cache: &mut MatchCache) -> bool {
        self.eval(event, Some(cache))
    }

    fn eval(&self, event: &Event, mut cache: Option<&mut MatchCache>) -> bool {
        if let Some(hit) = cache.as_deref().and_then(|cache| cache.get(self)) {
            return hit;
        }

        let result = match self {
            Rule::Match { key, value } => match_pair(key, value, event),
            Rule::NonMatch { key, value } => !match_pair(key, value, event),
            Rule::Fuzzy(atom) => event.iter().any(|(name, values)| {
                atom.is_fuzzy_match(name) || values.iter().any(|v| atom.is_fuzzy_match(v))
            }),
            Rule::And(subrules) => subrules
                .iter()
                .all(|rule| rule.eval(event, cache.as_deref_mut())),
            Rule::Or(subrules) => subrules
                .iter()
                .any(|rule| rule.eval(event, cache.as_deref_mut())),
            Rule::No(rule) => !rule.eval(event, cache.as_deref_mut()),
        };

        if let Some(cache) = cache {
            cache.results.insert(self.clone(), result);
        }
        result
    }
}

fn match_pair(key: &Atom, value: &Atom, event: &Event) -> bool {
    event
        .iter()
        .filter(|(name, _)| key.is_match(name))
        .any(|(_, values)| values.iter().any(|v| value.is_match(v)))
}

lazy_static::lazy_static! {
    static ref DETACHED_RULE: Arc<Rule> = Arc::new(Rule::Fuzzy(Atom::Star));
    static ref DETACHED_SET: Arc<BTreeSet<Rule>> = Arc::new(BTreeSet::new());
}

/// Moves the uniquely owned operands of `rule` to `pending`, leaving shared
/// placeholders behind.
fn detach(rule: &mut Rule, pending: &mut Vec<Rule>) {
    match rule {
        Rule::No(child) => {
            let child = std::mem::replace(child, DETACHED_RULE.clone());
            if let Ok(child) = Arc::try_unwrap(child) {
                pending.push(child);
            }
        }
        Rule::And(Subrules(set)) | Rule::Or(Subrules(set)) => {
            let set = std::mem::replace(set, DETACHED_SET.clone());
            if let Ok(set) = Arc::try_unwrap(set) {
                pending.extend(set);
            }
        }
        Rule::Match { .. } | Rule::NonMatch { .. } | Rule::Fuzzy(_) => {}
    }
}

impl Drop for Rule {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        detach(self, &mut pending);
        while let Some(mut rule) = pending.pop() {
            detach(&mut rule, &mut pending);
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Rule::match_all()
    }
}

/// Writes the rule-language text of the rule. Rules without a textual form
/// fail with [`fmt::Error`], which makes `to_string` panic; use
/// [`Rule::to_text`] when the rule may be unformattable.
impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.to_text().map_err(|e| {
            log::debug!("{}", e);
            fmt::Error
        })?;
        f.write_str(&text)
    }
}

impl FromStr for Rule {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        Rule::parse(s)
    }
}

impl TryFrom<&str> for Rule {
    type Error = RuleError;

    fn try_from(value: &str) -> Result<Self> {
        Rule::parse(value)
    }
}

/// Per-evaluation memo of rule results, keyed structurally.
#[derive(Debug, Default)]
pub struct MatchCache {
    results: HashMap<Rule, bool>,
}

impl MatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, rule: &Rule) -> Option<bool> {
        self.results.get(rule).copied()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }
}

/// Serde adapter storing a [`Rule`] as rule-language text.
///
/// ```rust
/// # use rulelang::Rule;
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct Filter {
///     #[serde(with = "rulelang::rules::rule_text")]
///     rule: Rule,
/// }
///
/// let filter: Filter = serde_json::from_str(r#"{"rule": "a=b"}"#).unwrap();
/// assert_eq!(filter.rule, Rule::matching("a", "b"));
/// ```
pub mod rule_text {
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::Rule;

    pub fn serialize<S>(rule: &Rule, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let text = rule.to_text().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Rule, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Rule::parse(&text).map_err(de::Error::custom)
    }
}
