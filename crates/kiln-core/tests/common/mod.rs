//! Shared test doubles and containers for kiln-core integration tests
//!
//! The in-memory collaborators record every call in a shared [`Journal`] so
//! tests can check stage order. The containers mirror the collaborators used
//! in production and need Docker.

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use kiln_core::externals::{
    Database, DatabaseError, Execution, ExecutionFailure, Executor, ExecutorError, FileStore,
    FileStoreError,
};
use kiln_core::record::RawRow;
use kiln_core::specification::JobRef;
use kiln_core::Fixture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use testcontainers_modules::postgres::Postgres;
use tracing::info;

pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";
pub const TEST_BUCKET: &str = "etl-files-test";

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kiln_core=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn row(value: Value) -> RawRow {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

// ============================================================================
// Journal
// ============================================================================

/// Ordered log of collaborator calls
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

// ============================================================================
// In-memory database
// ============================================================================

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<BTreeMap<String, Vec<RawRow>>>,
    journal: Journal,
    fail_clean: bool,
    fail_records: bool,
}

impl InMemoryDatabase {
    pub fn new(journal: Journal, tables: &[&str]) -> Self {
        Self {
            tables: Mutex::new(
                tables
                    .iter()
                    .map(|t| (t.to_string(), Vec::new()))
                    .collect(),
            ),
            journal,
            ..Self::default()
        }
    }

    pub fn failing_clean(mut self) -> Self {
        self.fail_clean = true;
        self
    }

    pub fn failing_records(mut self) -> Self {
        self.fail_records = true;
        self
    }

    pub fn insert(&self, table: &str, row: RawRow) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<RawRow> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn clean(&self) -> Result<usize, DatabaseError> {
        self.journal.record("database.clean");
        if self.fail_clean {
            return Err(DatabaseError::Unavailable("connection refused".to_string()));
        }

        let mut tables = self.tables.lock().unwrap();
        tables.values_mut().for_each(Vec::clear);
        Ok(tables.len())
    }

    async fn seed(&self, fixtures: &[&Fixture]) -> Result<usize, DatabaseError> {
        self.journal.record("database.seed");
        for fixture in fixtures {
            self.insert(&fixture.table, fixture.fields.clone());
        }
        Ok(fixtures.len())
    }

    async fn records(&self, table: &str, columns: &[String]) -> Result<Vec<RawRow>, DatabaseError> {
        self.journal.record(format!("database.records:{table}"));
        if self.fail_records {
            return Err(DatabaseError::Unavailable("connection reset".to_string()));
        }

        Ok(self
            .rows(table)
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|(k, _)| columns.is_empty() || columns.contains(k))
                    .collect()
            })
            .collect())
    }
}

// ============================================================================
// In-memory file store
// ============================================================================

#[derive(Default)]
pub struct InMemoryFileStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    journal: Journal,
}

impl InMemoryFileStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn clean(&self) -> Result<usize, FileStoreError> {
        self.journal.record("file_store.clean");
        let mut objects = self.objects.lock().unwrap();
        let count = objects.len();
        objects.clear();
        Ok(count)
    }

    async fn put(&self, key: &str, local_path: &Path) -> Result<(), FileStoreError> {
        self.journal.record(format!("file_store.put:{key}"));
        let bytes = std::fs::read(local_path).map_err(|e| FileStoreError::LocalFile {
            path: local_path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, FileStoreError> {
        Ok(self.objects.lock().unwrap().keys().cloned().collect())
    }
}

// ============================================================================
// Mock executor
// ============================================================================

#[derive(Debug, Clone)]
pub enum Behavior {
    Pass { stdout: String },
    Fail { code: i32, stdout: String },
    TimeOut { stdout: String },
    Unavailable,
}

/// One recorded executor call
#[derive(Debug, Clone)]
pub struct Call {
    pub job: JobRef,
    pub params: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Executor double; optionally writes rows into a database when it passes,
/// standing in for the job's side effects
pub struct MockExecutor {
    behavior: Behavior,
    journal: Journal,
    calls: Mutex<Vec<Call>>,
    writes: Vec<(Arc<InMemoryDatabase>, String, RawRow)>,
}

impl MockExecutor {
    pub fn new(journal: Journal, behavior: Behavior) -> Self {
        Self {
            behavior,
            journal,
            calls: Mutex::new(Vec::new()),
            writes: Vec::new(),
        }
    }

    pub fn passing(journal: Journal, stdout: &str) -> Self {
        Self::new(
            journal,
            Behavior::Pass {
                stdout: stdout.to_string(),
            },
        )
    }

    pub fn writing(mut self, database: Arc<InMemoryDatabase>, table: &str, row: RawRow) -> Self {
        self.writes.push((database, table.to_string(), row));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        job: &JobRef,
        params: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Execution, ExecutorError> {
        self.journal.record(format!("executor.execute:{}", job.name));
        self.calls.lock().unwrap().push(Call {
            job: job.clone(),
            params: params.clone(),
            timeout,
        });

        match &self.behavior {
            Behavior::Pass { stdout } => {
                for (database, table, row) in &self.writes {
                    database.insert(table, row.clone());
                }
                Ok(Execution {
                    exit_code: Some(0),
                    stdout: stdout.clone(),
                    stderr: String::new(),
                    duration: Duration::from_millis(10),
                })
            },
            Behavior::Fail { code, stdout } => Err(ExecutorError::Execution {
                failure: ExecutionFailure::NonZeroExit(*code),
                execution: Execution {
                    exit_code: Some(*code),
                    stdout: stdout.clone(),
                    stderr: "ERROR: job failed".to_string(),
                    duration: Duration::from_millis(10),
                },
            }),
            Behavior::TimeOut { stdout } => Err(ExecutorError::Execution {
                failure: ExecutionFailure::TimedOut(timeout),
                execution: Execution {
                    exit_code: None,
                    stdout: stdout.clone(),
                    stderr: String::new(),
                    duration: timeout,
                },
            }),
            Behavior::Unavailable => Err(ExecutorError::Infrastructure(
                "failed to start kitchen.sh: No such file or directory".to_string(),
            )),
        }
    }
}

// ============================================================================
// Containers
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    url: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        Ok(Self {
            _container: container,
            url: format!("postgresql://postgres:postgres@{}:{}/postgres", host, port),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

pub struct TestMinio {
    _container: ContainerAsync<GenericImage>,
    client: S3Client,
    endpoint: String,
}

impl TestMinio {
    /// Start MinIO and create `bucket`
    pub async fn start(bucket: &str) -> Result<Self> {
        info!("Starting MinIO test container...");

        let container = GenericImage::new("minio/minio", "latest")
            .with_exposed_port(9000.tcp())
            .with_wait_for(WaitFor::message_on_stdout("MinIO Object Storage Server"))
            .with_env_var("MINIO_ROOT_USER", MINIO_ACCESS_KEY)
            .with_env_var("MINIO_ROOT_PASSWORD", MINIO_SECRET_KEY)
            .with_cmd(vec!["server", "/data"])
            .start()
            .await
            .context("Failed to start MinIO container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get MinIO host")?;
        let port = container
            .get_host_port_ipv4(9000.tcp())
            .await
            .context("Failed to get MinIO port")?;
        let endpoint = format!("http://{}:{}", host, port);

        let s3_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                MINIO_ACCESS_KEY,
                MINIO_SECRET_KEY,
                None,
                None,
                "static",
            ))
            .load()
            .await;
        let client = S3Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        client
            .create_bucket()
            .bucket(bucket)
            .send()
            .await
            .context("Failed to create S3 bucket")?;

        Ok(Self {
            _container: container,
            client,
            endpoint,
        })
    }

    pub fn client(&self) -> &S3Client {
        &self.client
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Write `contents` under `dir` and return the path
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}
