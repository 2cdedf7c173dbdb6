//! Order-independent record comparison
//!
//! Rows coming from fixtures, assertions and the database carry loosely typed
//! values: YAML gives integers and floats, PostgreSQL gives text. A [`Record`]
//! normalizes every value to a canonical string so that `5`, `5.0` and `"5"`
//! compare equal, and a [`RecordSet`] compares rows as a multiset.

use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Raw row as loaded from YAML or returned by a database collaborator
pub type RawRow = serde_json::Map<String, Value>;

/// A normalized row: column name to canonical string value
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, String>);

impl Record {
    pub fn new<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), normalize_value(&value)))
                .collect(),
        )
    }

    pub fn from_row(row: &RawRow) -> Self {
        Self::new(row.iter().map(|(k, v)| (k.as_str(), v.clone())))
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unordered collection of records with multiset equality
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    keys: Vec<String>,
    /// Kept sorted so equality is a sequence comparison
    records: Vec<Record>,
}

impl RecordSet {
    pub fn new(records: impl IntoIterator<Item = Record>) -> Self {
        let records: Vec<Record> = records.into_iter().collect();

        let mut keys: Vec<String> = Vec::new();
        for record in &records {
            for column in record.columns() {
                if !keys.iter().any(|k| k == column) {
                    keys.push(column.to_string());
                }
            }
        }

        let mut sorted = records;
        sorted.sort();

        Self {
            keys,
            records: sorted,
        }
    }

    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a RawRow>) -> Self {
        Self::new(rows.into_iter().map(Record::from_row))
    }

    /// Union of column names across all records, in first-seen order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Records in canonical sorted order
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl PartialEq for RecordSet {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Eq for RecordSet {}

impl Serialize for RecordSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl FromIterator<Record> for RecordSet {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// Canonical string form of a raw value.
///
/// Numbers and strings that spell a plain decimal are rewritten without
/// exponent, trailing zeros or a trailing point. Strings with leading zeros
/// ("00501") are identifiers, not numbers, and stay as written. NULL is the
/// empty string.
pub fn normalize_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            let text = n.to_string();
            canonical_decimal(&text).unwrap_or(text)
        },
        Value::String(s) if is_plain_decimal(s) => {
            canonical_decimal(s).unwrap_or_else(|| s.clone())
        },
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn canonical_decimal(text: &str) -> Option<String> {
    BigDecimal::from_str(text)
        .ok()
        .map(|d| d.normalized().to_plain_string())
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?`
fn is_plain_decimal(s: &str) -> bool {
    let unsigned = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let int_ok = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && (int_part == "0" || !int_part.starts_with('0'));
    let frac_ok = frac_part
        .map(|f| !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(true);

    int_ok && frac_ok
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_row(value.as_object().unwrap())
    }

    #[test]
    fn test_numeric_forms_normalize_identically() {
        assert_eq!(normalize_value(&json!(5)), "5");
        assert_eq!(normalize_value(&json!(5.0)), "5");
        assert_eq!(normalize_value(&json!("5")), "5");
        assert_eq!(normalize_value(&json!("5.00")), "5");
        assert_eq!(normalize_value(&json!("-0.50")), "-0.5");
        assert_eq!(normalize_value(&json!(1e21)), "1000000000000000000000");
        assert_eq!(normalize_value(&json!(100)), "100");
    }

    #[test]
    fn test_non_numeric_strings_untouched() {
        assert_eq!(normalize_value(&json!("00501")), "00501");
        assert_eq!(normalize_value(&json!("5.")), "5.");
        assert_eq!(normalize_value(&json!("+5")), "+5");
        assert_eq!(normalize_value(&json!("Ann")), "Ann");
        assert_eq!(normalize_value(&json!("2024-01-01")), "2024-01-01");
    }

    #[test]
    fn test_null_and_bool() {
        assert_eq!(normalize_value(&Value::Null), "");
        assert_eq!(normalize_value(&json!(true)), "true");
    }

    #[test]
    fn test_record_equality_ignores_value_type() {
        let a = record(json!({"id": 5, "name": "Ann"}));
        let b = record(json!({"name": "Ann", "id": "5.0"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_column_names_are_case_sensitive() {
        let a = record(json!({"ID": 1}));
        let b = record(json!({"id": 1}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_set_is_a_multiset() {
        let one = RecordSet::new(vec![record(json!({"a": 1}))]);
        let two = RecordSet::new(vec![record(json!({"a": 1})), record(json!({"a": 1}))]);
        assert_ne!(one, two);
    }

    #[test]
    fn test_keys_union_in_first_seen_order() {
        let set = RecordSet::new(vec![
            record(json!({"a": 1, "b": 2})),
            record(json!({"c": 3})),
            record(json!({"b": 4, "d": 5})),
        ]);
        assert_eq!(set.keys(), ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_empty_sets_are_equal() {
        assert_eq!(RecordSet::default(), RecordSet::new(Vec::new()));
        assert!(RecordSet::default().keys().is_empty());
    }

    #[test]
    fn test_serializes_as_sorted_list() {
        let set = RecordSet::new(vec![
            record(json!({"id": 2})),
            record(json!({"id": 1})),
        ]);
        let yaml = serde_yaml::to_string(&set).unwrap();
        assert_eq!(yaml, "- id: '1'\n- id: '2'\n");
    }

    proptest! {
        #[test]
        fn prop_permutations_compare_equal(
            rows in proptest::collection::vec((0i64..5, "[a-c]{1,2}"), 0..8),
            seed in any::<u64>(),
        ) {
            let records: Vec<Record> = rows
                .iter()
                .map(|(id, name)| record(json!({"id": id, "name": name})))
                .collect();

            let mut shuffled = records.clone();
            let len = shuffled.len();
            if len > 1 {
                let mut state = seed;
                for i in (1..len).rev() {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    let j = (state >> 33) as usize % (i + 1);
                    shuffled.swap(i, j);
                }
            }

            prop_assert_eq!(RecordSet::new(records), RecordSet::new(shuffled));
        }
    }
}
