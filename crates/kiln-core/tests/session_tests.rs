//! Session and report tests

mod common;

use common::{row, Behavior, InMemoryDatabase, InMemoryFileStore, Journal, MockExecutor};
use kiln_core::runner::TestResult;
use kiln_core::session::{Reporter, Session, SessionListener};
use kiln_core::{Fixture, FixtureSet, Runner, RunnerSettings, RuntimeConfig, Specification};
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn spec(name: &str, fixture: &str, expected_output: &str) -> Specification {
    let yaml = format!(
        r#"
name: {name}
stage:
  fixtures: [{fixture}]
act:
  repository: etl
  name: {name}
  type: job
assert:
  - type: output
    value: {expected_output}
"#
    );
    Specification::from_yaml(
        Path::new(&format!("{name}.yaml")),
        serde_yaml::from_str(&yaml).unwrap(),
    )
    .unwrap()
}

fn runner(executor: MockExecutor, files_dir: &Path) -> Runner {
    let journal = Journal::default();
    Runner::new(
        Arc::new(InMemoryDatabase::new(journal.clone(), &["users"])),
        Arc::new(InMemoryFileStore::new(journal)),
        Arc::new(executor),
        FixtureSet::new([Fixture::new("ann", "users", row(json!({"id": 1})))]),
        RunnerSettings {
            files_dir: files_dir.to_path_buf(),
            runtime: RuntimeConfig::default(),
            timeout: Duration::from_secs(5),
        },
    )
}

#[derive(Default)]
struct RecordingListener {
    events: Mutex<Vec<String>>,
}

impl SessionListener for RecordingListener {
    fn suite_started(&self, total: usize) {
        self.events.lock().unwrap().push(format!("suite {total}"));
    }

    fn test_started(&self, index: usize, total: usize, specification: &Specification) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {index}/{total} {}", specification.name()));
    }

    fn test_finished(&self, index: usize, _total: usize, result: &TestResult) {
        self.events
            .lock()
            .unwrap()
            .push(format!("finish {index} {}", result.pass()));
    }
}

#[tokio::test]
async fn test_every_spec_yields_a_result_in_order() {
    let dir = TempDir::new().unwrap();
    let runner = runner(
        MockExecutor::passing(Journal::default(), "Job finished OK"),
        dir.path(),
    );
    let listener = RecordingListener::default();
    let session =
        Session::new(&runner, Reporter::new(dir.path().join("results"))).with_listener(&listener);

    let specs = [
        spec("first", "ann", "OK"),
        spec("second", "ghost", "OK"),
        spec("third", "ann", "NOPE"),
    ];
    let outcome = session.run(&specs).await;

    let names: Vec<_> = outcome.batch.results().iter().map(TestResult::name).collect();
    assert_eq!(names, ["first", "second", "third"]);
    let passes: Vec<_> = outcome.batch.results().iter().map(TestResult::pass).collect();
    assert_eq!(passes, [true, false, false]);
    assert!(!outcome.batch.pass());
    assert_eq!(outcome.batch.failures().count(), 2);

    assert_eq!(
        *listener.events.lock().unwrap(),
        [
            "suite 3",
            "start 1/3 first",
            "finish 1 true",
            "start 2/3 second",
            "finish 2 false",
            "start 3/3 third",
            "finish 3 false",
        ]
    );
}

#[tokio::test]
async fn test_report_files_are_written() {
    let dir = TempDir::new().unwrap();
    let results_dir = dir.path().join("results");
    let runner = runner(
        MockExecutor::new(
            Journal::default(),
            Behavior::Fail {
                code: 2,
                stdout: "loading users".to_string(),
            },
        ),
        dir.path(),
    );
    let session = Session::new(&runner, Reporter::new(&results_dir));

    let outcome = session.run(&[spec("broken", "ann", "OK")]).await;
    let files = outcome.report.unwrap();
    let result = &outcome.batch.results()[0];

    let data: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(&files.data).unwrap()).unwrap();
    assert_eq!(data["pass"], serde_yaml::Value::Bool(false));
    assert_eq!(
        data["run_id"].as_str().unwrap(),
        outcome.batch.run_id().to_string()
    );
    let reported = &data["results"][0];
    assert_eq!(reported["name"].as_str(), Some("broken"));
    assert_eq!(reported["execution"]["status"].as_str(), Some("failed"));
    assert_eq!(reported["execution"]["exit_code"].as_i64(), Some(2));
    assert!(reported.get("judgment").is_none());

    let rule = "-".repeat(80);
    let stdout = fs::read_to_string(&files.stdout).unwrap();
    assert_eq!(
        stdout,
        format!(
            "{rule}\nName: broken\nRun ID: {}\n{rule}\nloading users\n\n",
            result.id()
        )
    );
    let stderr = fs::read_to_string(&files.stderr).unwrap();
    assert!(stderr.contains("ERROR: job failed"));
}

#[tokio::test]
async fn test_timed_out_output_is_reported() {
    let dir = TempDir::new().unwrap();
    let results_dir = dir.path().join("results");
    let runner = runner(
        MockExecutor::new(
            Journal::default(),
            Behavior::TimeOut {
                stdout: "started loading users".to_string(),
            },
        ),
        dir.path(),
    );
    let session = Session::new(&runner, Reporter::new(&results_dir));

    let outcome = session.run(&[spec("hung", "ann", "OK")]).await;
    let files = outcome.report.unwrap();
    let result = &outcome.batch.results()[0];

    assert!(!outcome.batch.pass());
    let data: serde_yaml::Value =
        serde_yaml::from_str(&fs::read_to_string(&files.data).unwrap()).unwrap();
    let reported = &data["results"][0];
    assert_eq!(reported["execution"]["status"].as_str(), Some("timed_out"));
    assert_eq!(
        reported["execution"]["message"].as_str(),
        Some("execution timed out after 5.00s")
    );

    let rule = "-".repeat(80);
    assert_eq!(
        fs::read_to_string(&files.stdout).unwrap(),
        format!(
            "{rule}\nName: hung\nRun ID: {}\n{rule}\nstarted loading users\n\n",
            result.id()
        )
    );
}

#[tokio::test]
async fn test_unwritable_results_dir_keeps_the_batch() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("results");
    fs::write(&blocker, "not a directory").unwrap();
    let runner = runner(MockExecutor::passing(Journal::default(), "OK"), dir.path());
    let session = Session::new(&runner, Reporter::new(&blocker));

    let outcome = session.run(&[spec("only", "ann", "OK")]).await;

    assert!(outcome.batch.pass());
    assert!(outcome.report.is_err());
}

#[tokio::test]
async fn test_empty_suite_passes() {
    let dir = TempDir::new().unwrap();
    let runner = runner(MockExecutor::passing(Journal::default(), "OK"), dir.path());
    let session = Session::new(&runner, Reporter::new(dir.path().join("results")));

    let outcome = session.run(&[]).await;

    assert!(outcome.batch.pass());
    let files = outcome.report.unwrap();
    assert_eq!(fs::read_to_string(files.stdout).unwrap(), "");
}
