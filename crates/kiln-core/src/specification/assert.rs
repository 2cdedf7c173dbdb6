//! Expected outcomes of a test
//!
//! ```yaml
//! assert:
//!   assertions:
//!     - type: table
//!       name: agents
//!       records:
//!         - { call_sign: hunter, first: Bruce }
//!     - type: output
//!       value: 'Finished processing'
//! ```
//!
//! A plain list under `assert:` is accepted as well.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::scalar_text;
use crate::error::SpecError;
use crate::record::{RawRow, RecordSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Assertion {
    Table(TableAssertion),
    Output(OutputAssertion),
}

/// The table must contain exactly these records, compared on their columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableAssertion {
    pub table: String,
    pub records: RecordSet,
}

impl TableAssertion {
    pub fn new(table: impl Into<String>, records: RecordSet) -> Self {
        Self {
            table: table.into(),
            records,
        }
    }

    /// Columns to select from the table
    pub fn columns(&self) -> &[String] {
        self.records.keys()
    }
}

/// Executor stdout must contain `value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputAssertion {
    pub value: String,
}

impl OutputAssertion {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct AssertionDocument {
    #[serde(rename = "type")]
    kind: String,
    #[serde(alias = "name")]
    table: Option<String>,
    records: Vec<RawRow>,
    value: Option<Value>,
}

/// Parse the `assert:` section, either a list or `{assertions: [...]}`
pub(crate) fn parse_assertions(section: Value) -> Result<Vec<Assertion>, SpecError> {
    let items = match section {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        Value::Mapping(mut mapping) => match mapping.remove("assertions") {
            Some(Value::Sequence(items)) if mapping.is_empty() => items,
            Some(Value::Null) if mapping.is_empty() => Vec::new(),
            _ => {
                return Err(SpecError::Malformed(
                    "assert must be a list or contain only an 'assertions' list".to_string(),
                ))
            },
        },
        _ => {
            return Err(SpecError::Malformed(
                "assert must be a list of assertions".to_string(),
            ))
        },
    };

    items.into_iter().map(parse_assertion).collect()
}

fn parse_assertion(item: Value) -> Result<Assertion, SpecError> {
    let doc: AssertionDocument = serde_yaml::from_value(item)?;

    match doc.kind.trim().to_lowercase().as_str() {
        "" => Err(SpecError::MissingField("assertion type")),
        "table" => {
            let table = doc
                .table
                .filter(|t| !t.trim().is_empty())
                .ok_or(SpecError::IncompleteAssertion {
                    kind: "table",
                    field: "table",
                })?;
            Ok(Assertion::Table(TableAssertion::new(
                table,
                RecordSet::from_rows(&doc.records),
            )))
        },
        "output" => {
            let value = doc
                .value
                .as_ref()
                .and_then(scalar_text)
                .ok_or(SpecError::IncompleteAssertion {
                    kind: "output",
                    field: "value",
                })?;
            Ok(Assertion::Output(OutputAssertion::new(value)))
        },
        _ => Err(SpecError::UnknownAssertion(doc.kind)),
    }
}
