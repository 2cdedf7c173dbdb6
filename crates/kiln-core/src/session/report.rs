//! Results directory writer
//!
//! ```text
//! results/
//!   data.yaml          summary of the batch
//!   executor_out.txt   stdout of every test, one block each
//!   executor_err.txt   stderr of every test, one block each
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::BatchResult;

pub const DATA_FILE: &str = "data.yaml";
pub const STDOUT_FILE: &str = "executor_out.txt";
pub const STDERR_FILE: &str = "executor_err.txt";

const BLOCK_RULE_WIDTH: usize = 80;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReportError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Paths of the files a report was written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub dir: PathBuf,
    pub data: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Reporter {
    dir: PathBuf,
}

impl Reporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the batch, replacing any previous report in the directory
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn write(&self, batch: &BatchResult) -> Result<ReportFiles, ReportError> {
        fs::create_dir_all(&self.dir).map_err(|e| ReportError::io(&self.dir, e))?;

        let files = ReportFiles {
            dir: self.dir.clone(),
            data: self.dir.join(DATA_FILE),
            stdout: self.dir.join(STDOUT_FILE),
            stderr: self.dir.join(STDERR_FILE),
        };

        let data = serde_yaml::to_string(batch)?;
        fs::write(&files.data, data).map_err(|e| ReportError::io(&files.data, e))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        for result in batch.results() {
            let (out, err) = result
                .execution()
                .map(|e| (e.stdout.as_str(), e.stderr.as_str()))
                .unwrap_or_default();
            write_block(&mut stdout, result.name(), result.id(), out);
            write_block(&mut stderr, result.name(), result.id(), err);
        }
        fs::write(&files.stdout, stdout).map_err(|e| ReportError::io(&files.stdout, e))?;
        fs::write(&files.stderr, stderr).map_err(|e| ReportError::io(&files.stderr, e))?;

        debug!(tests = batch.results().len(), "Report written");
        Ok(files)
    }
}

fn write_block(buf: &mut String, name: &str, id: Uuid, contents: &str) {
    let rule = "-".repeat(BLOCK_RULE_WIDTH);
    // Writing to a String cannot fail
    let _ = write!(
        buf,
        "{rule}\nName: {name}\nRun ID: {id}\n{rule}\n{contents}\n\n"
    );
}
