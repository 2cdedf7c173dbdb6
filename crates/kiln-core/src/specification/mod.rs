//! Declarative test specifications
//!
//! One YAML document describes one test:
//!
//! ```yaml
//! name: Declassify Users
//! stage:
//!   fixtures: [hulk, iron_man]
//!   files:
//!     - src: noc_list.csv
//!       dest: input/noc_list.csv
//! act:
//!   repository: top_secret
//!   name: declassify_users
//!   type: job
//!   params:
//!     files:
//!       input_file: noc_list.csv
//!     keys:
//!       code: '{codes.the_secret_one}'
//! assert:
//!   assertions:
//!     - type: table
//!       name: agents
//!       records:
//!         - { call_sign: hulk, first: Bruce }
//!     - type: output
//!       value: 'Finished processing'
//! ```

mod act;
mod assert;
mod stage;

pub use act::{Act, JobRef, JobType, Params};
pub use assert::{Assertion, OutputAssertion, TableAssertion};
pub use stage::{Stage, StagedFile};

use kiln_common::yaml::{YamlDocument, YamlReader};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result, SpecError};

/// Text of a YAML scalar; `None` for null, sequences and mappings
pub(crate) fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specification {
    name: String,
    path: PathBuf,
    stage: Stage,
    act: Act,
    assertions: Vec<Assertion>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SpecificationDocument {
    name: String,
    stage: stage::StageDocument,
    act: act::ActDocument,
    assert: serde_yaml::Value,
}

impl Specification {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        stage: Stage,
        act: Act,
        assertions: Vec<Assertion>,
    ) -> std::result::Result<Self, SpecError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SpecError::MissingField("name"));
        }

        Ok(Self {
            name,
            path: path.into(),
            stage,
            act,
            assertions,
        })
    }

    /// Build from one parsed YAML document
    pub fn from_yaml(
        path: impl Into<PathBuf>,
        value: serde_yaml::Value,
    ) -> std::result::Result<Self, SpecError> {
        let doc: SpecificationDocument = serde_yaml::from_value(value)?;

        let stage = Stage::try_from(doc.stage)?;
        let act = Act::try_from(doc.act)?;
        let assertions = assert::parse_assertions(doc.assert)?;

        Self::new(doc.name, path, stage, act, assertions)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value = YamlReader::read(path)?;
        Self::from_yaml(path, value).map_err(|e| Error::specification(path, e))
    }

    /// Load every specification under `path` (a file or a directory tree),
    /// ordered by path.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let specs = YamlReader::all(path.as_ref())?
            .into_iter()
            .map(|YamlDocument { path, value }| {
                Self::from_yaml(&path, value).map_err(|e| Error::specification(&path, e))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(path = %path.as_ref().display(), count = specs.len(), "Loaded specifications");
        Ok(specs)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the specification was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn act(&self) -> &Act {
        &self.act
    }

    /// Assertions in declaration order
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }
}
