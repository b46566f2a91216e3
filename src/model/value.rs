//! Typed opaque value used for `MediaItem.metadata`, `external_ids`, and
//! `Release.attributes` bags.
//!
//! Per the design notes carried from the distilled spec: interpretation of
//! these bags happens only at the edges (parsers, template expansion); the
//! core's control flow never matches on their contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dynamically-typed value stored in a metadata bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absence of a value (distinct from a missing key).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Numeric value (integer or float).
    Number(f64),
    /// String value.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested key/value map.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns the value as a string slice, if it holds one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, if it holds an integral number.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        Self::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// A key/value bag of [`Value`]s, serialized to/from JSON for storage.
pub type ValueMap = BTreeMap<String, Value>;

/// Serializes a [`ValueMap`] to its JSON storage representation.
#[must_use]
pub fn serialize_bag(bag: &ValueMap) -> String {
    serde_json::to_string(bag).unwrap_or_else(|_| "{}".to_string())
}

/// Parses a JSON storage representation back into a [`ValueMap`].
///
/// Invalid or missing JSON falls back to an empty bag rather than failing;
/// these bags are advisory metadata, never load-bearing for core control flow.
#[must_use]
pub fn parse_bag(raw: &str) -> ValueMap {
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bag_round_trips_through_json() {
        let mut bag = ValueMap::new();
        bag.insert("imdb".to_string(), Value::from("tt1234567"));
        bag.insert("tmdb".to_string(), Value::from(603_i64));
        bag.insert("verified".to_string(), Value::from(true));

        let json = serialize_bag(&bag);
        let parsed = parse_bag(&json);
        assert_eq!(parsed.get("imdb").and_then(Value::as_str), Some("tt1234567"));
        assert_eq!(parsed.get("tmdb").and_then(Value::as_i64), Some(603));
    }

    #[test]
    fn parse_bag_falls_back_to_empty_on_garbage() {
        let parsed = parse_bag("not json");
        assert!(parsed.is_empty());
    }
}
