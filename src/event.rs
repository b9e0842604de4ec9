use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A multi-valued attribute collection tested against rules.
///
/// Every attribute name maps to a set of distinct string values. An
/// attribute exists only while it has at least one value.
///
/// Implements `From<serde_json::Value>` for easy construction from JSON:
/// nested objects flatten to dotted names, arrays become multiple values
/// and scalars are stringified.
///
/// ```rust
/// # use serde_json::json;
/// # use rulelang::Event;
///  let event: Event = Event::new()
///                     .with("host", "example.com")
///                     .with("asn", "1234");
///  assert!(event.contains("host", "example.com"));
///
///  // from JSON
///  let event: Event = json!({"ip": ["192.0.2.1", "192.0.2.2"], "geo": {"cc": "FI"}}).into();
///  assert_eq!(event.values("ip").count(), 2);
///  assert!(event.contains("geo.cc", "FI"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Event {
    attrs: BTreeMap<String, BTreeSet<String>>,
}

impl Event {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add(key, value);
        self
    }

    /// Adds `value` under `key`. Returns false if it was already present.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        self.attrs.entry(key.into()).or_default().insert(value.into())
    }

    pub fn discard(&mut self, key: &str, value: &str) -> bool {
        let Some(values) = self.attrs.get_mut(key) else {
            return false;
        };
        let removed = values.remove(value);
        if values.is_empty() {
            self.attrs.remove(key);
        }
        removed
    }

    pub fn clear(&mut self, key: &str) {
        self.attrs.remove(key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }

    pub fn values<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> {
        self.attrs
            .get(key)
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.attrs
            .get(key)
            .map_or(false, |values| values.contains(value))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attrs.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.attrs.iter()
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    fn add_json(&mut self, key: String, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(s) => {
                self.add(key, s.as_str());
            }
            Value::Bool(b) => {
                self.add(key, b.to_string());
            }
            Value::Number(n) => {
                self.add(key, n.to_string());
            }
            Value::Array(items) => items
                .iter()
                .for_each(|item| self.add_json(key.clone(), item)),
            Value::Object(map) => map
                .iter()
                .for_each(|(k, v)| self.add_json(format!("{}.{}", key, k), v)),
        }
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut attrs = BTreeMap::<String, BTreeSet<String>>::deserialize(deserializer)?;
        attrs.retain(|_, values| !values.is_empty());
        Ok(Event { attrs })
    }
}

impl From<Value> for Event {
    fn from(data: Value) -> Self {
        Event::from(&data)
    }
}

impl From<&Value> for Event {
    fn from(data: &Value) -> Self {
        let mut event = Event::default();
        if let Some(map) = data.as_object() {
            map.iter()
                .for_each(|(k, v)| event.add_json(k.clone(), v));
        }
        event
    }
}

impl<K, V> FromIterator<(K, V)> for Event
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut event = Event::default();
        iter.into_iter().for_each(|(k, v)| {
            event.add(k, v);
        });
        event
    }
}
