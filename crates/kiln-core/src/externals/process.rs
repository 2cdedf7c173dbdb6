//! Executor that shells out to the data integration scripts
//!
//! Jobs run through `kitchen.sh`, transformations through `pan.sh`:
//!
//! ```text
//! kitchen.sh -rep=<repository> -job=<name> [args...] -param:<key>=<value>...
//! pan.sh     -rep=<repository> -trans=<name> [args...] -param:<key>=<value>...
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{Execution, ExecutionFailure, Executor, ExecutorError};
use crate::specification::{JobRef, JobType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Directory holding the scripts; also the working directory
    pub dir: PathBuf,
    pub timeout_secs: u64,
    /// Extra arguments passed before the params, e.g. `-level=Basic`
    pub args: Vec<String>,
    pub job_script: String,
    pub transformation_script: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/opt/data-integration"),
            timeout_secs: 900,
            args: Vec::new(),
            job_script: "kitchen.sh".to_string(),
            transformation_script: "pan.sh".to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Override values from `KILN_EXECUTOR_DIR` and `KILN_EXECUTOR_TIMEOUT`
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("KILN_EXECUTOR_DIR") {
            self.dir = PathBuf::from(dir);
        }
        if let Some(timeout) = std::env::var("KILN_EXECUTOR_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            self.timeout_secs = timeout;
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("executor timeout_secs must be greater than zero".to_string());
        }
        if self.job_script.is_empty() || self.transformation_script.is_empty() {
            return Err("executor script names cannot be empty".to_string());
        }
        Ok(())
    }
}

pub struct ProcessExecutor {
    config: ExecutorConfig,
}

impl ProcessExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    fn program(&self, job_type: JobType) -> PathBuf {
        let script = match job_type {
            JobType::Job => &self.config.job_script,
            JobType::Transformation => &self.config.transformation_script,
        };
        self.config.dir.join(script)
    }

    /// Arguments for one invocation; params are passed in key order
    pub fn arguments(&self, job: &JobRef, params: &BTreeMap<String, String>) -> Vec<String> {
        let flag = match job.job_type {
            JobType::Job => "job",
            JobType::Transformation => "trans",
        };

        let mut args = vec![
            format!("-rep={}", job.repository),
            format!("-{}={}", flag, job.name),
        ];
        args.extend(self.config.args.iter().cloned());
        args.extend(params.iter().map(|(k, v)| format!("-param:{}={}", k, v)));
        args
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    #[instrument(skip(self, params), fields(job = %job.name, repository = %job.repository))]
    async fn execute(
        &self,
        job: &JobRef,
        params: &BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Execution, ExecutorError> {
        let program = self.program(job.job_type);
        let args = self.arguments(job, params);

        debug!(program = %program.display(), args = args.len(), "Spawning executor");

        let started = Instant::now();
        let mut child = Command::new(&program)
            .args(&args)
            .current_dir(&self.config.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ExecutorError::Infrastructure(format!(
                    "failed to start {}: {}",
                    program.display(),
                    e
                ))
            })?;

        let stdout = Capture::start(child.stdout.take());
        let stderr = Capture::start(child.stderr.take());

        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ExecutorError::Infrastructure(format!(
                    "failed waiting for {}: {}",
                    program.display(),
                    e
                )))
            },
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed out executor");
                }
                let execution = Execution {
                    exit_code: None,
                    stdout: stdout.finish(KILLED_OUTPUT_GRACE).await,
                    stderr: stderr.finish(KILLED_OUTPUT_GRACE).await,
                    duration: started.elapsed(),
                };
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    stdout_bytes = execution.stdout.len(),
                    "Executor timed out, process killed"
                );
                return Err(ExecutorError::Execution {
                    failure: ExecutionFailure::TimedOut(timeout),
                    execution,
                });
            },
        };

        let execution = Execution {
            exit_code: status.code(),
            stdout: stdout.finish(EXITED_OUTPUT_GRACE).await,
            stderr: stderr.finish(EXITED_OUTPUT_GRACE).await,
            duration: started.elapsed(),
        };

        match status.code() {
            Some(0) => Ok(execution),
            Some(code) => Err(ExecutorError::Execution {
                failure: ExecutionFailure::NonZeroExit(code),
                execution,
            }),
            None => Err(ExecutorError::Execution {
                failure: ExecutionFailure::Terminated,
                execution,
            }),
        }
    }
}

/// How long to keep draining a pipe once the script has exited; a background
/// child holding the pipe open must not stall the run.
const EXITED_OUTPUT_GRACE: Duration = Duration::from_secs(5);
const KILLED_OUTPUT_GRACE: Duration = Duration::from_millis(250);

/// Output stream drained into a shared buffer as the process writes it, so
/// whatever was printed survives a kill.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn start<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);

        let reader = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink.lock().await.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Executor output stream closed");
                        break;
                    },
                }
            }
        });

        Self { buffer, reader }
    }

    /// Wait up to `grace` for the stream to close, then take what was read
    async fn finish(mut self, grace: Duration) -> String {
        if tokio::time::timeout(grace, &mut self.reader).await.is_err() {
            self.reader.abort();
        }
        let bytes = self.buffer.lock().await;
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
