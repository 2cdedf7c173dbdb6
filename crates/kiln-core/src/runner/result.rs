//! Per-test outcome produced by the runner

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

use crate::externals::{Execution, ExecutionFailure};
use crate::judge::Judgment;

/// Steps of the fixed per-test sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    CleanDatabase,
    SeedDatabase,
    CleanFileStore,
    SeedFileStore,
    Execute,
    Assert,
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageName::CleanDatabase => "clean database",
            StageName::SeedDatabase => "seed database",
            StageName::CleanFileStore => "clean file store",
            StageName::SeedFileStore => "seed file store",
            StageName::Execute => "execute",
            StageName::Assert => "assert",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A staged fixture name is unknown
    Fixture,
    /// Act params could not be resolved
    Configuration,
    /// A collaborator could not do its job
    Infrastructure,
}

/// A fatal per-test failure outside of assertions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: StageName,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: StageName, kind: FailureKind, error: impl fmt::Display) -> Self {
        Self {
            stage,
            kind,
            message: error.to_string(),
        }
    }

    pub fn infrastructure(stage: StageName, error: impl fmt::Display) -> Self {
        Self::new(stage, FailureKind::Infrastructure, error)
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

/// What each preparation stage did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounts {
    pub tables_cleaned: usize,
    pub records_seeded: usize,
    pub files_deleted: usize,
    pub files_uploaded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Passed,
    Failed,
    TimedOut,
}

/// Executor result as recorded on a test
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub exit_code: Option<i32>,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    pub duration: Duration,
    #[serde(skip)]
    pub stdout: String,
    #[serde(skip)]
    pub stderr: String,
}

impl ExecutionOutcome {
    pub fn succeeded(execution: Execution) -> Self {
        Self::from_parts(ExecutionStatus::Passed, None, execution)
    }

    pub fn failed(failure: ExecutionFailure, execution: Execution) -> Self {
        let status = match failure {
            ExecutionFailure::TimedOut(_) => ExecutionStatus::TimedOut,
            _ => ExecutionStatus::Failed,
        };
        Self::from_parts(status, Some(failure.to_string()), execution)
    }

    fn from_parts(status: ExecutionStatus, message: Option<String>, execution: Execution) -> Self {
        Self {
            status,
            message,
            exit_code: execution.exit_code,
            duration: execution.duration,
            stdout: execution.stdout,
            stderr: execution.stderr,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ExecutionStatus::Passed
    }
}

/// Immutable outcome of one specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    id: Uuid,
    name: String,
    path: PathBuf,
    pass: bool,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    duration: Duration,
    stages: StageCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<StageFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<ExecutionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    judgment: Option<Judgment>,
}

impl TestResult {
    /// Passes only when nothing failed, the executor succeeded and the
    /// judgment holds; a missing judgment is a failure.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        duration: Duration,
        stages: StageCounts,
        failure: Option<StageFailure>,
        execution: Option<ExecutionOutcome>,
        judgment: Option<Judgment>,
    ) -> Self {
        let pass = failure.is_none()
            && execution.as_ref().is_some_and(ExecutionOutcome::passed)
            && judgment.as_ref().is_some_and(Judgment::pass);

        Self {
            id,
            name: name.into(),
            path: path.into(),
            pass,
            duration,
            stages,
            failure,
            execution,
            judgment,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pass(&self) -> bool {
        self.pass
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn stages(&self) -> &StageCounts {
        &self.stages
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    pub fn execution(&self) -> Option<&ExecutionOutcome> {
        self.execution.as_ref()
    }

    pub fn judgment(&self) -> Option<&Judgment> {
        self.judgment.as_ref()
    }

    /// One-line reason for a failed test
    pub fn cause(&self) -> Option<String> {
        if self.pass {
            return None;
        }
        if let Some(failure) = &self.failure {
            return Some(failure.to_string());
        }
        if let Some(message) = self.execution.as_ref().and_then(|e| e.message.clone()) {
            return Some(message);
        }
        match &self.judgment {
            Some(judgment) => Some(
                judgment
                    .failures()
                    .iter()
                    .map(|f| f.describe())
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            None => Some("assertions were not evaluated".to_string()),
        }
    }
}

pub(crate) fn seconds<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((duration.as_secs_f64() * 100.0).round() / 100.0)
}
