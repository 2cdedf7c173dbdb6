//! Evaluates a specification's assertions against what actually happened

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use tracing::{debug, instrument};

use crate::externals::{Database, DatabaseError};
use crate::record::RecordSet;
use crate::specification::{Assertion, Specification};

/// A single assertion that did not hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FailedAssertion {
    Table {
        table: String,
        expected: RecordSet,
        actual: RecordSet,
    },
    Output {
        expected_substring: String,
    },
}

impl FailedAssertion {
    pub fn describe(&self) -> String {
        match self {
            FailedAssertion::Table {
                table,
                expected,
                actual,
            } => format!(
                "table '{}' expected {} record(s), found {} different",
                table,
                expected.len(),
                actual.len()
            ),
            FailedAssertion::Output { expected_substring } => {
                format!("output does not contain '{}'", expected_substring)
            },
        }
    }
}

/// Every failed assertion, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Judgment {
    failures: Vec<FailedAssertion>,
}

impl Judgment {
    pub fn new(failures: Vec<FailedAssertion>) -> Self {
        Self { failures }
    }

    pub fn pass(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[FailedAssertion] {
        &self.failures
    }
}

impl Serialize for Judgment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Judgment", 2)?;
        state.serialize_field("pass", &self.pass())?;
        state.serialize_field("failures", &self.failures)?;
        state.end()
    }
}

pub struct Judge<'a> {
    database: &'a dyn Database,
}

impl<'a> Judge<'a> {
    pub fn new(database: &'a dyn Database) -> Self {
        Self { database }
    }

    /// Evaluate all assertions; a database error aborts the assessment
    #[instrument(skip_all, fields(test = %specification.name()))]
    pub async fn assess(
        &self,
        specification: &Specification,
        output: &str,
    ) -> Result<Judgment, DatabaseError> {
        let mut failures = Vec::new();

        for assertion in specification.assertions() {
            match assertion {
                Assertion::Table(expected) => {
                    let rows = self
                        .database
                        .records(&expected.table, expected.columns())
                        .await?;
                    let actual = RecordSet::from_rows(&rows);

                    if actual != expected.records {
                        debug!(table = %expected.table, "Table assertion failed");
                        failures.push(FailedAssertion::Table {
                            table: expected.table.clone(),
                            expected: expected.records.clone(),
                            actual,
                        });
                    }
                },
                Assertion::Output(expected) => {
                    if !output.contains(&expected.value) {
                        debug!(value = %expected.value, "Output assertion failed");
                        failures.push(FailedAssertion::Output {
                            expected_substring: expected.value.clone(),
                        });
                    }
                },
            }
        }

        Ok(Judgment::new(failures))
    }
}
