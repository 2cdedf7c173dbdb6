//! `kiln run` command implementation
//!
//! Loads everything up front so that configuration and document errors stop
//! the run before any collaborator is touched, then runs the suite.

use kiln_core::config::{KilnConfig, Layout};
use kiln_core::externals::{PgDatabase, ProcessExecutor, S3FileStore};
use kiln_core::session::{Reporter, Session};
use kiln_core::{Runner, RunnerSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::output::{print_summary, ConsoleProgress};
use crate::Outcome;

/// Run the suite at `path` (or the kiln directory's specs)
pub async fn run(
    path: Option<&Path>,
    config: &Path,
    kiln_dir: &Path,
    results_dir: &Path,
) -> Result<Outcome> {
    let config = KilnConfig::load(config)?;
    let layout = Layout::new(kiln_dir, results_dir);
    let fixtures = layout.load_fixtures()?;
    let specifications = layout.load_specifications(path)?;

    info!(
        specifications = specifications.len(),
        fixtures = fixtures.len(),
        "Suite loaded"
    );

    let database = PgDatabase::connect(&config.database).await?;
    let file_store = S3FileStore::new(&config.file_store)?;
    let executor = ProcessExecutor::new(config.executor.clone());

    let runner = Runner::new(
        Arc::new(database),
        Arc::new(file_store),
        Arc::new(executor),
        fixtures,
        RunnerSettings {
            files_dir: layout.files_dir(),
            runtime: config.runtime.clone(),
            timeout: config.executor.timeout(),
        },
    );

    let progress = ConsoleProgress;
    let outcome = Session::new(&runner, Reporter::new(&layout.results_dir))
        .with_listener(&progress)
        .run(&specifications)
        .await;

    print_summary(&outcome.batch, &outcome.report);

    Ok(Outcome::from_pass(
        outcome.batch.pass() && outcome.report.is_ok(),
    ))
}
