use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

/// Field name → samples, one per observed period, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TimeSeriesRecord(BTreeMap<String, Vec<Option<f64>>>);

impl TimeSeriesRecord {
    /// Builds the record from per-period snapshots delivered newest first.
    ///
    /// Every field seen in any snapshot gets a series; a snapshot lacking
    /// the field, or carrying a non-numeric value for it, contributes `None`.
    pub fn from_newest_first(snapshots: Vec<Map<String, Value>>) -> Self {
        let fields = snapshots
            .iter()
            .flat_map(Map::keys)
            .cloned()
            .collect::<BTreeSet<_>>();

        let oldest_first = snapshots.into_iter().rev().collect::<Vec<_>>();

        Self(
            fields
                .into_iter()
                .map(|field| {
                    let samples = oldest_first
                        .iter()
                        .map(|snapshot| snapshot.get(&field).and_then(Value::as_f64))
                        .collect();
                    (field, samples)
                })
                .collect(),
        )
    }

    pub fn field(&self, name: &str) -> Option<&[Option<f64>]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Vec<Option<f64>>> {
        self.0.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, samples: Vec<Option<f64>>) {
        self.0.insert(name.into(), samples);
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn reverses_delivery_order() {
        let record = TimeSeriesRecord::from_newest_first(vec![
            snapshot(json!({"rank": 3, "timestamp": 300})),
            snapshot(json!({"rank": 5, "timestamp": 200})),
            snapshot(json!({"rank": 9, "timestamp": 100})),
        ]);

        assert_eq!(record.field("rank"), Some(&[Some(9.0), Some(5.0), Some(3.0)][..]));
        assert_eq!(
            record.field("timestamp"),
            Some(&[Some(100.0), Some(200.0), Some(300.0)][..])
        );
    }

    #[test]
    fn missing_and_non_numeric_samples_become_holes() {
        let record = TimeSeriesRecord::from_newest_first(vec![
            snapshot(json!({"pp": 10.5, "rank": "n/a"})),
            snapshot(json!({"pp": 9.5})),
        ]);

        assert_eq!(record.field("pp"), Some(&[Some(9.5), Some(10.5)][..]));
        assert_eq!(record.field("rank"), Some(&[None, None][..]));
    }

    #[test]
    fn empty_history_has_no_fields() {
        let record = TimeSeriesRecord::from_newest_first(vec![]);
        assert!(record.is_empty());
        assert_eq!(record.fields().count(), 0);
    }
}
