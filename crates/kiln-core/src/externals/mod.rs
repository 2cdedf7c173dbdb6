//! External collaborators driven by the runner
//!
//! The runner only talks to these traits. Concrete implementations:
//!
//! - [`PgDatabase`]: PostgreSQL through `sqlx`
//! - [`S3FileStore`]: S3 or MinIO through `aws-sdk-s3`
//! - [`ProcessExecutor`]: `kitchen.sh` / `pan.sh` through `tokio::process`

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fixture::Fixture;
use crate::record::RawRow;
use crate::specification::JobRef;

pub mod postgres;
pub mod process;
pub mod s3;

pub use postgres::{DatabaseConfig, PgDatabase};
pub use process::{ExecutorConfig, ProcessExecutor};
pub use s3::{FileStoreConfig, S3FileStore};

// ============================================================================
// Database
// ============================================================================

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Failed to seed fixture '{fixture}': {source}")]
    Seed {
        fixture: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database configuration error: {0}. Check DATABASE_URL and the database section.")]
    Config(String),

    #[error("{0}")]
    Unavailable(String),
}

impl DatabaseError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Relational store that fixtures are seeded into and assertions read from
#[async_trait]
pub trait Database: Send + Sync {
    /// Empty every managed table, returning how many tables were emptied
    async fn clean(&self) -> Result<usize, DatabaseError>;

    /// Insert each fixture as one row, returning how many rows were inserted
    async fn seed(&self, fixtures: &[&Fixture]) -> Result<usize, DatabaseError>;

    /// Read `columns` of every row in `table`; all columns when empty
    async fn records(&self, table: &str, columns: &[String]) -> Result<Vec<RawRow>, DatabaseError>;
}

// ============================================================================
// File store
// ============================================================================

#[derive(Error, Debug)]
pub enum FileStoreError {
    #[error("Refusing to use bucket '{0}': bucket names must end with 'test'")]
    UnsafeBucket(String),

    #[error("File store configuration error: {0}")]
    Config(String),

    #[error("Failed to read {path}: {message}")]
    LocalFile { path: PathBuf, message: String },

    #[error("S3 {operation} failed: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },
}

impl FileStoreError {
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Request {
            operation,
            message: message.into(),
        }
    }
}

/// Object store that staged files are uploaded to
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Delete every object, returning how many were deleted
    async fn clean(&self) -> Result<usize, FileStoreError>;

    async fn put(&self, key: &str, local_path: &Path) -> Result<(), FileStoreError>;

    async fn list(&self) -> Result<Vec<String>, FileStoreError>;
}

// ============================================================================
// Executor
// ============================================================================

/// Captured outcome of one executor invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// None when the process never exited (timeout or signal)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// Why an execution that ran did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionFailure {
    NonZeroExit(i32),
    Terminated,
    TimedOut(Duration),
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionFailure::NonZeroExit(code) => {
                write!(f, "execution returned an error (exit code {})", code)
            },
            ExecutionFailure::Terminated => write!(f, "execution was terminated by a signal"),
            ExecutionFailure::TimedOut(after) => {
                write!(f, "execution timed out after {:.2}s", after.as_secs_f64())
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    /// The job ran and failed; the test fails without assertions
    #[error("{failure}")]
    Execution {
        failure: ExecutionFailure,
        execution: Execution,
    },

    /// The job could not be run at all
    #[error("Executor unavailable: {0}")]
    Infrastructure(String),
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        job: &JobRef,
        params: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Execution, ExecutorError>;
}
