//! Pre-execution state: fixtures to insert and files to upload

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SpecError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Stage {
    fixtures: Vec<String>,
    files: Vec<StagedFile>,
}

/// A local file (relative to the files directory) and its object key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedFile {
    pub src: PathBuf,
    pub dest: String,
}

impl StagedFile {
    pub fn new(src: impl Into<PathBuf>, dest: impl Into<String>) -> Result<Self, SpecError> {
        let src = src.into();
        let dest = dest.into();

        if src.as_os_str().is_empty() {
            return Err(SpecError::MissingField("stage.files.src"));
        }
        if dest.trim().is_empty() {
            return Err(SpecError::MissingField("stage.files.dest"));
        }

        Ok(Self { src, dest })
    }

    pub fn local_path(&self, files_dir: &Path) -> PathBuf {
        files_dir.join(&self.src)
    }
}

impl Stage {
    pub fn new(fixtures: Vec<String>, files: Vec<StagedFile>) -> Self {
        Self { fixtures, files }
    }

    /// Fixture names in insertion order
    pub fn fixtures(&self) -> &[String] {
        &self.fixtures
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct StageDocument {
    fixtures: Vec<String>,
    #[serde(alias = "s3_files")]
    files: Vec<StagedFileDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StagedFileDocument {
    #[serde(alias = "path")]
    src: String,
    #[serde(alias = "key")]
    dest: String,
}

impl TryFrom<StageDocument> for Stage {
    type Error = SpecError;

    fn try_from(doc: StageDocument) -> Result<Self, Self::Error> {
        let files = doc
            .files
            .into_iter()
            .map(|f| StagedFile::new(f.src, f.dest))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(doc.fixtures, files))
    }
}
