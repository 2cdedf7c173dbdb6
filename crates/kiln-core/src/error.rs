//! Error types for kiln-core
//!
//! Load-time problems (`Error`) abort a run before any test starts. Per-test
//! problems (`FixtureNotFound`, `ParamError`, collaborator errors) are caught
//! by the runner and recorded on that test's result.

use kiln_common::CommonError;
use std::path::PathBuf;
use thiserror::Error;

use crate::externals::{DatabaseError, FileStoreError};
use crate::session::ReportError;

/// Result type alias for load-time operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run before any test executes
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Invalid specification {path}: {source}")]
    Specification {
        path: PathBuf,
        #[source]
        source: SpecError,
    },

    #[error("Invalid fixture '{name}': {source}")]
    Fixture {
        name: String,
        #[source]
        source: SpecError,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    FileStore(#[from] FileStoreError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn specification(path: impl Into<PathBuf>, source: SpecError) -> Self {
        Self::Specification {
            path: path.into(),
            source,
        }
    }
}

/// Validation failures for specification and fixture documents
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("unknown act type '{0}' (expected job or transformation)")]
    UnknownActType(String),

    #[error("unknown assertion type '{0}' (expected table or output)")]
    UnknownAssertion(String),

    #[error("{kind} assertion is missing '{field}'")]
    IncompleteAssertion {
        kind: &'static str,
        field: &'static str,
    },

    #[error("param '{0}' is defined more than once")]
    DuplicateParam(String),

    #[error("{0}")]
    Malformed(String),

    #[error("malformed document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A staged fixture name that the fixture set does not contain
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fixture not found: {name}")]
pub struct FixtureNotFound {
    pub name: String,
}

/// Failure to compile act params against the runtime configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("param '{param}' references '{{{placeholder}}}' which is not in the configuration")]
    Unresolved { param: String, placeholder: String },

    #[error("param '{param}' has an unterminated placeholder")]
    Unterminated { param: String },

    #[error("cannot resolve file param '{param}': {message}")]
    File { param: String, message: String },
}
