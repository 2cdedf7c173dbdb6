//! Suite execution: runs specifications in order and persists the report

mod report;

pub use report::{ReportError, ReportFiles, Reporter};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::runner::{seconds, Runner, TestResult};
use crate::specification::Specification;

/// Progress hooks for callers that want to render a suite as it runs
///
/// `index` is one-based.
pub trait SessionListener: Send + Sync {
    fn suite_started(&self, _total: usize) {}

    fn test_started(&self, _index: usize, _total: usize, _specification: &Specification) {}

    fn test_finished(&self, _index: usize, _total: usize, _result: &TestResult) {}
}

/// Listener that ignores every event
pub struct SilentListener;

impl SessionListener for SilentListener {}

/// Ordered results of one suite run
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    pass: bool,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    duration: Duration,
    results: Vec<TestResult>,
}

impl BatchResult {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, results: Vec<TestResult>) -> Self {
        let pass = results.iter().all(TestResult::pass);
        let duration = results.iter().map(TestResult::duration).sum();

        Self {
            run_id,
            started_at,
            pass,
            duration,
            results,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// True when every test passed; an empty suite passes
    pub fn pass(&self) -> bool {
        self.pass
    }

    /// Sum of the per-test durations
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| !r.pass())
    }
}

/// What a finished session produced
#[derive(Debug)]
pub struct SessionOutcome {
    pub batch: BatchResult,
    /// The batch survives a failed report write
    pub report: Result<ReportFiles, ReportError>,
}

pub struct Session<'a> {
    runner: &'a Runner,
    reporter: Reporter,
    listener: &'a dyn SessionListener,
}

impl<'a> Session<'a> {
    pub fn new(runner: &'a Runner, reporter: Reporter) -> Self {
        Self {
            runner,
            reporter,
            listener: &SilentListener,
        }
    }

    pub fn with_listener(mut self, listener: &'a dyn SessionListener) -> Self {
        self.listener = listener;
        self
    }

    /// Run every specification sequentially in the given order, one result
    /// each, then write the report
    pub async fn run(&self, specifications: &[Specification]) -> SessionOutcome {
        let run_id = Uuid::new_v4();
        let span = info_span!("suite", run_id = %run_id, tests = specifications.len());

        async {
            let started_at = Utc::now();
            let total = specifications.len();
            info!("Suite started");
            self.listener.suite_started(total);

            let mut results = Vec::with_capacity(total);
            for (i, specification) in specifications.iter().enumerate() {
                self.listener.test_started(i + 1, total, specification);
                let result = self.runner.run(specification).await;
                self.listener.test_finished(i + 1, total, &result);
                results.push(result);
            }

            let batch = BatchResult::new(run_id, started_at, results);
            info!(
                pass = batch.pass(),
                failed = batch.failures().count(),
                "Suite finished"
            );

            let report = self.reporter.write(&batch);
            if let Err(e) = &report {
                warn!(error = %e, "Failed to write report");
            }

            SessionOutcome { batch, report }
        }
        .instrument(span)
        .await
    }
}
