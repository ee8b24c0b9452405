//! Metadata filters and their Qdrant encoding.

use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Payload field that partitions the collection into namespaces.
pub const NAMESPACE_FIELD: &str = "namespace";

/// Stored namespace value for entries written to the default (empty) namespace.
pub const DEFAULT_NAMESPACE: &str = "__default__";

/// Conjunction of metadata equality conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: BTreeMap<String, Value>,
}

impl MetadataFilter {
    /// Empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(key.into(), value.into());
        self
    }

    /// Whether no conditions were added.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parse `key=value` pairs. Integers and booleans keep their type; anything else is a string.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(format!("empty key in '{pair}'"));
            }
            let raw = raw.trim();
            let value = if let Ok(number) = raw.parse::<i64>() {
                Value::from(number)
            } else if let Ok(flag) = raw.parse::<bool>() {
                Value::from(flag)
            } else {
                Value::from(raw)
            };
            filter = filter.equals(key, value);
        }
        Ok(filter)
    }

    pub(crate) fn must_conditions(&self) -> Vec<Value> {
        self.conditions
            .iter()
            .map(|(key, value)| field_match(key, value.clone()))
            .collect()
    }
}

fn field_match(key: &str, value: Value) -> Value {
    json!({ "key": key, "match": { "value": value } })
}

/// Value stored in the namespace field. The empty namespace maps to [`DEFAULT_NAMESPACE`] so it
/// stays a partition of its own.
pub(crate) fn namespace_value(namespace: &str) -> &str {
    let namespace = namespace.trim();
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// Condition selecting `namespace`.
pub(crate) fn namespace_condition(namespace: &str) -> Value {
    field_match(NAMESPACE_FIELD, Value::from(namespace_value(namespace)))
}

/// Build a Qdrant filter from extra conditions scoped to `namespace`.
pub(crate) fn scoped_filter(namespace: &str, mut must: Vec<Value>) -> Value {
    must.push(namespace_condition(namespace));
    json!({ "must": must })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_are_sorted_and_scoped() {
        let filter = MetadataFilter::new()
            .equals("sector", "minerals")
            .equals("document_type", "policy");

        assert_eq!(
            scoped_filter("ecowas", filter.must_conditions()),
            json!({
                "must": [
                    {"key": "document_type", "match": {"value": "policy"}},
                    {"key": "sector", "match": {"value": "minerals"}},
                    {"key": "namespace", "match": {"value": "ecowas"}}
                ]
            })
        );
    }

    #[test]
    fn empty_namespace_is_its_own_partition() {
        let expected = json!({"must": [{"key": "namespace", "match": {"value": DEFAULT_NAMESPACE}}]});
        assert_eq!(scoped_filter("", Vec::new()), expected);
        assert_eq!(scoped_filter("  ", Vec::new()), expected);
        assert_eq!(namespace_value(" ecowas "), "ecowas");
    }

    #[test]
    fn pairs_keep_scalar_types() {
        let filter =
            MetadataFilter::from_pairs(["sector=energy", "chunk_index=0", "draft=false"]).expect("pairs");
        assert_eq!(
            filter,
            MetadataFilter::new()
                .equals("sector", "energy")
                .equals("chunk_index", 0)
                .equals("draft", false)
        );
        assert!(MetadataFilter::from_pairs(["sector"]).is_err());
        assert!(MetadataFilter::from_pairs(["=x"]).is_err());
    }
}
