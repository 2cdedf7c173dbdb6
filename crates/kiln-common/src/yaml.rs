//! YAML loading for single files and whole directory trees
//!
//! Fixtures and specifications are kept as many small YAML files. `all` walks a
//! directory and returns every document, `smash` shallow-merges them into one
//! mapping so that fixtures spread across files resolve as a single namespace.

use crate::error::{CommonError, Result};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const EXTENSIONS: &[&str] = &["yml", "yaml"];

/// One parsed YAML file
#[derive(Debug, Clone, PartialEq)]
pub struct YamlDocument {
    pub path: PathBuf,
    pub value: Value,
}

pub struct YamlReader;

impl YamlReader {
    /// Parse one file. An empty file yields an empty mapping.
    pub fn read(path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| CommonError::io(path, e))?;

        if contents.trim().is_empty() {
            return Ok(Value::Mapping(Mapping::new()));
        }

        serde_yaml::from_str(&contents).map_err(|e| CommonError::yaml(path, e))
    }

    /// Every YAML document under `path`, sorted by path.
    ///
    /// A file path yields exactly that file regardless of its extension.
    pub fn all(path: impl AsRef<Path>) -> Result<Vec<YamlDocument>> {
        let path = path.as_ref();

        if !path.is_dir() {
            let value = Self::read(path)?;
            return Ok(vec![YamlDocument {
                path: path.to_path_buf(),
                value,
            }]);
        }

        let mut documents = Vec::new();
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| CommonError::Walk {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

            if !entry.file_type().is_file() || !is_yaml(entry.path()) {
                continue;
            }

            let value = Self::read(entry.path())?;
            documents.push(YamlDocument {
                path: entry.path().to_path_buf(),
                value,
            });
        }

        debug!(dir = %path.display(), files = documents.len(), "Read YAML tree");
        Ok(documents)
    }

    /// Shallow-merge every top-level mapping under `path`; later files win.
    pub fn smash(path: impl AsRef<Path>) -> Result<Mapping> {
        let mut merged = Mapping::new();

        for document in Self::all(path)? {
            match document.value {
                Value::Mapping(mapping) => merged.extend(mapping),
                Value::Null => {},
                _ => return Err(CommonError::NotAMapping(document.path)),
            }
        }

        Ok(merged)
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
