use std::collections::BTreeMap;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Named parameters of a fetch (player id, result-set type, page number and
/// whatever else a provider understands).
///
/// Keys are kept sorted, so two parameter sets built in a different
/// insertion order compare and fingerprint equally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FetchParams(BTreeMap<String, Value>);

impl FetchParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `self` laid over `defaults`; explicit parameters win on key collision.
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        let mut merged = defaults.clone();
        merged
            .0
            .extend(self.0.iter().map(|(key, value)| (key.clone(), value.clone())));
        merged
    }

    /// Canonical JSON: object keys sorted at every depth, no whitespace.
    pub fn canonical_json(&self) -> String {
        let canonical = Value::Object(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), canonicalize(value)))
                .collect(),
        );
        canonical.to_string()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        Fingerprint(hex::encode(digest))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for FetchParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

// serde_json's `Map` keeps insertion order when `preserve_order` is enabled
// anywhere in the dependency graph, so nested objects are rebuilt sorted.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut entries = object.iter().collect::<Vec<_>>();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonicalize(value)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Opaque digest of a parameter set; only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct Fingerprint(String);

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> FetchParams {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn fingerprint_ignores_key_insertion_order() {
        let a = params(&[
            ("playerId", json!("76561198")),
            ("scoresType", json!("recent")),
            ("scoresPage", json!(1)),
        ]);
        let b = params(&[
            ("scoresPage", json!(1)),
            ("playerId", json!("76561198")),
            ("scoresType", json!("recent")),
        ]);
        let c = params(&[
            ("scoresType", json!("recent")),
            ("scoresPage", json!(1)),
            ("playerId", json!("76561198")),
        ]);

        assert_eq!(a.fingerprint(), a.fingerprint());
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(b.fingerprint(), a.fingerprint());
        assert_eq!(b.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_nested_key_order() {
        let mut forward = Map::new();
        forward.insert("from".into(), json!(1));
        forward.insert("to".into(), json!(2));
        let mut backward = Map::new();
        backward.insert("to".into(), json!(2));
        backward.insert("from".into(), json!(1));

        let a = FetchParams::new().with("range", Value::Object(forward));
        let b = FetchParams::new().with("range", Value::Object(backward));

        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn different_values_give_different_fingerprints() {
        let page_one = FetchParams::new().with("scoresPage", 1);
        let page_two = FetchParams::new().with("scoresPage", 2);
        let page_one_as_string = FetchParams::new().with("scoresPage", "1");

        assert_ne!(page_one.fingerprint(), page_two.fingerprint());
        assert_ne!(page_one.fingerprint(), page_one_as_string.fingerprint());
    }

    #[test]
    fn explicit_params_override_defaults() {
        let defaults = FetchParams::new()
            .with("scoresType", "top")
            .with("scoresPage", 1);
        let explicit = FetchParams::new().with("scoresType", "recent");

        let merged = explicit.merged_over(&defaults);

        assert_eq!(merged.get_str("scoresType"), Some("recent"));
        assert_eq!(merged.get_u64("scoresPage"), Some(1));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn canonical_json_is_sorted() {
        let params = FetchParams::new().with("b", 1).with("a", json!({"y": 1, "x": 2}));
        assert_eq!(params.canonical_json(), r#"{"a":{"x":2,"y":1},"b":1}"#);
    }
}
