use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RuleError};
use crate::event::Event;
use crate::rules::{rule_text, MatchCache, Rule};

/// A rule with a name, as written in rule files.
///
/// ```yaml
/// name: phishing-hosts
/// description: known phishing hosts outside our own network
/// rule: host=example.com and no ip in 192.0.2.0/24
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(with = "rule_text")]
    pub rule: Rule,
}

impl NamedRule {
    pub fn new(name: impl Into<String>, rule: Rule) -> Self {
        NamedRule {
            name: name.into(),
            description: None,
            rule,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Named rules evaluated together against events.
#[derive(Debug, Default)]
pub struct RuleCollection {
    rules: BTreeMap<String, NamedRule>,
}

impl RuleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `rule`, replacing and returning any rule of the same name.
    pub fn insert(&mut self, rule: NamedRule) -> Option<NamedRule> {
        self.rules.insert(rule.name.clone(), rule)
    }

    pub fn remove(&mut self, name: &str) -> Option<NamedRule> {
        self.rules.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&NamedRule> {
        self.rules.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedRule> {
        self.rules.values()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn extend(&mut self, other: RuleCollection) {
        self.rules.extend(other.rules);
    }

    /// Loads every `*.yml` file below `path`. Files that can not be read
    /// or parsed are logged and skipped.
    ///
    /// Returns the number of rules added. A rule replacing one of the same
    /// name is not counted.
    pub fn load_ruleset(&mut self, path: &str) -> Result<usize> {
        let mut additions = 0;

        for entry in glob::glob(format!("{}/**/*.yml", path).as_str())?.filter_map(|entry| {
            entry
                .map_err(|e| log::warn!("error reading rule path: {}", e))
                .ok()
        }) {
            let loaded = std::fs::read_to_string(&entry)
                .map_err(RuleError::from)
                .and_then(|s| RuleCollection::from_str(&s));

            match loaded {
                Ok(collection) => {
                    log::debug!(
                        "loaded {} rules from {}",
                        collection.len(),
                        entry.to_string_lossy()
                    );
                    for rule in collection.rules.into_values() {
                        if let Some(replaced) = self.insert(rule) {
                            log::warn!(
                                "rule {} redefined in {}",
                                replaced.name,
                                entry.to_string_lossy()
                            );
                        } else {
                            additions += 1;
                        }
                    }
                }
                Err(e) => log::warn!("error loading rules: {} ({})", entry.to_string_lossy(), e),
            }
        }

        Ok(additions)
    }

    /// Evaluates every rule against `event`, returning the matching rules
    /// in name order.
    ///
    /// All rules share one cache, so a sub-rule common to several rules is
    /// evaluated once per event.
    pub fn eval<'a>(&'a self, event: &Event) -> Vec<&'a NamedRule> {
        let mut cache = MatchCache::new();
        let matched: Vec<&NamedRule> = self
            .rules
            .values()
            .filter(|named| named.rule.is_match_with_cache(event, &mut cache))
            .collect();

        log::trace!(
            "{} of {} rules matched ({} cached results)",
            matched.len(),
            self.rules.len(),
            cache.len()
        );
        matched
    }

    pub fn eval_json<'a>(&'a self, data: &serde_json::Value) -> Vec<&'a NamedRule> {
        self.eval(&Event::from(data))
    }
}

impl FromStr for RuleCollection {
    type Err = RuleError;

    /// Parses a YAML stream holding one [`NamedRule`] per document.
    fn from_str(s: &str) -> Result<Self> {
        let mut collection = RuleCollection::default();
        for document in serde_yaml::Deserializer::from_str(s) {
            collection.insert(NamedRule::deserialize(document)?);
        }
        Ok(collection)
    }
}

impl FromIterator<NamedRule> for RuleCollection {
    fn from_iter<T: IntoIterator<Item = NamedRule>>(iter: T) -> Self {
        let mut collection = RuleCollection::default();
        iter.into_iter().for_each(|rule| {
            collection.insert(rule);
        });
        collection
    }
}
