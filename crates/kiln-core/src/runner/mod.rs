//! Drives one specification through the fixed stage sequence
//!
//! clean database → seed database → clean file store → seed file store →
//! execute → assert. Stages never reorder or skip, except that assertions are
//! not evaluated when execution did not succeed. A failure in a preparation
//! stage ends the test; the runner never returns an error, every outcome is a
//! [`TestResult`].

mod result;

pub use result::{
    ExecutionOutcome, ExecutionStatus, FailureKind, StageCounts, StageFailure, StageName,
    TestResult,
};
pub(crate) use result::seconds;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::externals::{Database, Executor, ExecutorError, FileStore};
use crate::fixture::FixtureSet;
use crate::judge::{Judge, Judgment};
use crate::runtime::RuntimeConfig;
use crate::specification::Specification;

/// Settings shared by every test in a suite
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Base directory for staged files and `files` params
    pub files_dir: PathBuf,
    pub runtime: RuntimeConfig,
    pub timeout: Duration,
}

pub struct Runner {
    database: Arc<dyn Database>,
    file_store: Arc<dyn FileStore>,
    executor: Arc<dyn Executor>,
    fixtures: FixtureSet,
    settings: RunnerSettings,
}

impl Runner {
    pub fn new(
        database: Arc<dyn Database>,
        file_store: Arc<dyn FileStore>,
        executor: Arc<dyn Executor>,
        fixtures: FixtureSet,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            database,
            file_store,
            executor,
            fixtures,
            settings,
        }
    }

    pub async fn run(&self, specification: &Specification) -> TestResult {
        let id = Uuid::new_v4();
        let span = info_span!("test", name = %specification.name(), run_id = %id);

        self.run_stages(id, specification).instrument(span).await
    }

    async fn run_stages(&self, id: Uuid, specification: &Specification) -> TestResult {
        let started = Instant::now();
        let mut counts = StageCounts::default();

        let finish = |counts: StageCounts,
                      failure: Option<StageFailure>,
                      execution: Option<ExecutionOutcome>,
                      judgment: Option<Judgment>| {
            TestResult::new(
                id,
                specification.name(),
                specification.path(),
                started.elapsed(),
                counts,
                failure,
                execution,
                judgment,
            )
        };

        if let Err(failure) = self.prepare(specification, &mut counts).await {
            warn!(stage = %failure.stage, kind = ?failure.kind, error = %failure.message, "Test aborted");
            return finish(counts, Some(failure), None, None);
        }

        let execution = match self.execute(specification).await {
            Ok(execution) => execution,
            Err(failure) => {
                warn!(stage = %failure.stage, error = %failure.message, "Test aborted");
                return finish(counts, Some(failure), None, None);
            },
        };

        if !execution.passed() {
            info!(
                status = ?execution.status,
                message = execution.message.as_deref().unwrap_or_default(),
                "Execution failed, skipping assertions"
            );
            return finish(counts, None, Some(execution), None);
        }

        let judge = Judge::new(self.database.as_ref());
        match judge.assess(specification, &execution.stdout).await {
            Ok(judgment) => {
                info!(
                    assertions = specification.assertions().len(),
                    failed = judgment.failures().len(),
                    "Assertions evaluated"
                );
                finish(counts, None, Some(execution), Some(judgment))
            },
            Err(e) => {
                let failure = StageFailure::infrastructure(StageName::Assert, e);
                warn!(error = %failure.message, "Assertions could not be evaluated");
                finish(counts, Some(failure), Some(execution), None)
            },
        }
    }

    /// Stages one to four
    async fn prepare(
        &self,
        specification: &Specification,
        counts: &mut StageCounts,
    ) -> Result<(), StageFailure> {
        counts.tables_cleaned = self
            .database
            .clean()
            .await
            .map_err(|e| StageFailure::infrastructure(StageName::CleanDatabase, e))?;
        info!(tables = counts.tables_cleaned, "Database cleaned");

        let fixtures = self
            .fixtures
            .resolve(specification.stage().fixtures())
            .map_err(|e| StageFailure::new(StageName::SeedDatabase, FailureKind::Fixture, e))?;
        counts.records_seeded = self
            .database
            .seed(&fixtures)
            .await
            .map_err(|e| StageFailure::infrastructure(StageName::SeedDatabase, e))?;
        info!(records = counts.records_seeded, "Database seeded");

        counts.files_deleted = self
            .file_store
            .clean()
            .await
            .map_err(|e| StageFailure::infrastructure(StageName::CleanFileStore, e))?;
        info!(files = counts.files_deleted, "File store cleaned");

        for file in specification.stage().files() {
            let local = file.local_path(&self.settings.files_dir);
            self.file_store
                .put(&file.dest, &local)
                .await
                .map_err(|e| StageFailure::infrastructure(StageName::SeedFileStore, e))?;
            counts.files_uploaded += 1;
        }
        info!(files = counts.files_uploaded, "File store seeded");

        Ok(())
    }

    /// Stage five; execution failures are outcomes, only an unusable
    /// executor or unresolvable params end the test here
    async fn execute(&self, specification: &Specification) -> Result<ExecutionOutcome, StageFailure> {
        let act = specification.act();
        let params = act
            .compiled_params(&self.settings.files_dir, &self.settings.runtime)
            .map_err(|e| StageFailure::new(StageName::Execute, FailureKind::Configuration, e))?;

        match self
            .executor
            .execute(act.job(), &params, self.settings.timeout)
            .await
        {
            Ok(execution) => {
                info!(
                    duration_ms = execution.duration.as_millis() as u64,
                    "Execution succeeded"
                );
                Ok(ExecutionOutcome::succeeded(execution))
            },
            Err(ExecutorError::Execution { failure, execution }) => {
                Ok(ExecutionOutcome::failed(failure, execution))
            },
            Err(e @ ExecutorError::Infrastructure(_)) => {
                Err(StageFailure::infrastructure(StageName::Execute, e))
            },
        }
    }
}
