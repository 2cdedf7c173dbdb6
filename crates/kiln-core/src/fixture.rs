//! Named seed rows
//!
//! Fixtures live in YAML under `fixtures/`, keyed by a logical name:
//!
//! ```yaml
//! ann:
//!   table: users
//!   fields:
//!     id: 1
//!     name: Ann
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::error::{Error, FixtureNotFound, SpecError};
use crate::record::RawRow;

/// One row to insert into `table`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub name: String,
    pub table: String,
    pub fields: RawRow,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FixtureDocument {
    #[serde(default)]
    table: String,
    #[serde(default)]
    fields: RawRow,
}

impl Fixture {
    pub fn new(name: impl Into<String>, table: impl Into<String>, fields: RawRow) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields,
        }
    }
}

/// Every fixture known to a suite, built once and never mutated
#[derive(Debug, Clone, Default)]
pub struct FixtureSet {
    fixtures: BTreeMap<String, Fixture>,
}

impl FixtureSet {
    pub fn new(fixtures: impl IntoIterator<Item = Fixture>) -> Self {
        Self {
            fixtures: fixtures.into_iter().map(|f| (f.name.clone(), f)).collect(),
        }
    }

    /// Build from a merged YAML mapping of name to `{table, fields}`
    pub fn from_mapping(mapping: Mapping) -> Result<Self, Error> {
        let mut fixtures = BTreeMap::new();

        for (key, value) in mapping {
            let name = match key {
                Value::String(s) => s,
                other => serde_yaml::to_string(&other)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default(),
            };

            let doc: FixtureDocument = serde_yaml::from_value(value).map_err(|e| Error::Fixture {
                name: name.clone(),
                source: SpecError::Yaml(e),
            })?;

            if doc.table.trim().is_empty() {
                return Err(Error::Fixture {
                    name,
                    source: SpecError::MissingField("table"),
                });
            }

            fixtures.insert(name.clone(), Fixture::new(name, doc.table, doc.fields));
        }

        Ok(Self { fixtures })
    }

    pub fn get(&self, name: &str) -> Result<&Fixture, FixtureNotFound> {
        self.fixtures.get(name).ok_or_else(|| FixtureNotFound {
            name: name.to_string(),
        })
    }

    /// Resolve names in order, failing on the first unknown one
    pub fn resolve<'a, I, S>(&self, names: I) -> Result<Vec<&Fixture>, FixtureNotFound>
    where
        I: IntoIterator<Item = &'a S>,
        S: AsRef<str> + 'a + ?Sized,
    {
        names.into_iter().map(|n| self.get(n.as_ref())).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fixtures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_name_is_merged_from_key() {
        let set = FixtureSet::from_mapping(mapping(
            "ann:\n  table: users\n  fields:\n    id: 1\n    name: Ann\n",
        ))
        .unwrap();

        let ann = set.get("ann").unwrap();
        assert_eq!(ann.name, "ann");
        assert_eq!(ann.table, "users");
        assert_eq!(ann.fields.get("id"), Some(&json!(1)));
    }

    #[test]
    fn test_missing_fixture_names_the_fixture() {
        let set = FixtureSet::default();
        let err = set.get("ghost").unwrap_err();
        assert_eq!(err.to_string(), "fixture not found: ghost");
    }

    #[test]
    fn test_resolve_stops_at_first_unknown() {
        let set = FixtureSet::new(vec![Fixture::new("a", "t", RawRow::new())]);
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let err = set.resolve(&names).unwrap_err();
        assert_eq!(err.name, "b");
    }

    #[test]
    fn test_table_is_required() {
        let err = FixtureSet::from_mapping(mapping("orphan:\n  fields: {id: 1}\n")).unwrap_err();
        assert!(matches!(
            err,
            Error::Fixture {
                source: SpecError::MissingField("table"),
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = FixtureSet::from_mapping(mapping("x:\n  table: t\n  colums: {}\n"));
        assert!(err.is_err());
    }
}
