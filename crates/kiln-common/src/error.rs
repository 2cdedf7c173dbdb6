//! Error types shared across kiln crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Expected a YAML mapping at the top of {0}")]
    NotAMapping(PathBuf),

    #[error("Failed to walk directory {path}: {message}")]
    Walk { path: PathBuf, message: String },
}

impl CommonError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn yaml(path: impl Into<PathBuf>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            path: path.into(),
            source,
        }
    }

    /// Path of the file the error refers to
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Io { path, .. } | Self::Yaml { path, .. } | Self::Walk { path, .. } => path,
            Self::NotAMapping(path) => path,
        }
    }
}
