//! Error types for the kiln CLI
//!
//! Every variant stops a command before it can report pass or fail, so they
//! all map to exit status 2.

use kiln_core::externals::{DatabaseError, FileStoreError};
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration, specification or fixture could not be loaded
    #[error("{0}. Fix the file and run 'kiln validate' to check the suite.")]
    Load(#[from] kiln_core::Error),

    /// The database could not be reached
    #[error("{0}. Check DATABASE_URL and that the database is running.")]
    Database(#[from] DatabaseError),

    /// The file store client could not be built
    #[error("{0}. Check the file_store section and the S3_* environment variables.")]
    FileStore(#[from] FileStoreError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
