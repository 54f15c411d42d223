//! Capture dispatcher - idempotent, per-host serialized capture jobs.
//!
//! A job is identified by its fingerprint (scope, host, normalized command
//! set). Submitting a fingerprint that already has a queued, running or
//! succeeded job returns that job untouched. A failed latest job is
//! resubmitted as a new record linked through `retry_of`, up to
//! `max_resubmits` times.
//!
//! Each job runs on its own task:
//!
//! 1. wait for the host lock (one session per device at a time)
//! 2. connect and run every command, each under the command timeout
//! 3. on transport failure, back off and retry the whole attempt
//! 4. extract facts from the final attempt's successful raw logs
//!
//! The whole of it, lock wait included, runs under the job ceiling.
//! Completion is published on a watch channel per job.

use crate::catalog::ScopeCatalog;
use crate::config::CaptureConfig;
use crate::executor::{DeviceExecutor, ExecError};
use crate::raw_log::RawLogWriter;
use chrono::Utc;
use netriage_common::commands::{dedup_commands, device_error_marker, is_read_only};
use netriage_common::parsers::extract;
use netriage_common::rpc::CaptureResponse;
use netriage_common::{
    fingerprint, AttemptOutcome, CaptureAttempt, CaptureJob, Device, FailureKind, JobFailure,
    JobStatus, RawLog, RawOutcome, Scope, TriageError, TriageResult,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct JobEntry {
    job: CaptureJob,
    device: Device,
    status_tx: watch::Sender<JobStatus>,
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<String, JobEntry>,
    /// fingerprint -> job ids, oldest first
    by_fingerprint: HashMap<String, Vec<String>>,
}

struct Inner {
    catalog: ScopeCatalog,
    executor: Arc<dyn DeviceExecutor>,
    writer: RawLogWriter,
    config: CaptureConfig,
    table: Mutex<JobTable>,
    host_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Outcome of the attempt loop, before facts are extracted.
enum RunOutcome {
    Completed { attempt: u32 },
    Failed(JobFailure),
}

#[derive(Clone)]
pub struct CaptureDispatcher {
    inner: Arc<Inner>,
}

impl CaptureDispatcher {
    pub fn new(
        catalog: ScopeCatalog,
        executor: Arc<dyn DeviceExecutor>,
        writer: RawLogWriter,
        config: CaptureConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                catalog,
                executor,
                writer,
                config,
                table: Mutex::new(JobTable::default()),
                host_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Submit a capture. Returns the existing job for a known fingerprint.
    pub fn submit(
        &self,
        scope: &Scope,
        host: &str,
        commands: &[String],
    ) -> TriageResult<CaptureResponse> {
        let device = self.inner.catalog.device(scope, host)?;
        let commands = validate_commands(commands)?;
        self.admit(scope, device, commands)
    }

    /// Explicitly retry a failed job. Same bound as resubmission.
    pub fn retry(&self, job_id: &str) -> TriageResult<CaptureResponse> {
        let (scope, host, commands, status) = {
            let table = self.inner.lock_table()?;
            let entry = table
                .jobs
                .get(job_id)
                .ok_or_else(|| TriageError::UnknownJob(job_id.to_string()))?;
            (
                entry.job.scope.clone(),
                entry.job.host.clone(),
                entry.job.commands.clone(),
                entry.job.status,
            )
        };

        if status != JobStatus::Failed {
            return Err(TriageError::InvalidCommand(format!(
                "job {} is {:?}, only failed jobs can be retried",
                job_id, status
            )));
        }

        let device = self.inner.catalog.device(&scope, &host)?;
        self.admit(&scope, device, commands)
    }

    /// Immutable snapshot of a job.
    pub fn get(&self, job_id: &str) -> TriageResult<CaptureJob> {
        let table = self.inner.lock_table()?;
        table
            .jobs
            .get(job_id)
            .map(|e| e.job.clone())
            .ok_or_else(|| TriageError::UnknownJob(job_id.to_string()))
    }

    /// Wait until the job is terminal, then return its snapshot.
    pub async fn wait(&self, job_id: &str, timeout: Duration) -> TriageResult<CaptureJob> {
        let mut rx = {
            let table = self.inner.lock_table()?;
            table
                .jobs
                .get(job_id)
                .map(|e| e.status_tx.subscribe())
                .ok_or_else(|| TriageError::UnknownJob(job_id.to_string()))?
        };

        let terminal = async {
            loop {
                if rx.borrow_and_update().is_terminal() {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };

        if tokio::time::timeout(timeout, terminal).await.is_err() {
            return Err(TriageError::Timeout(format!(
                "job {} not finished after {}s",
                job_id,
                timeout.as_secs()
            )));
        }
        self.get(job_id)
    }

    /// Where this dispatcher persists raw output.
    pub fn raw_logs(&self) -> &RawLogWriter {
        &self.inner.writer
    }

    pub fn job_count(&self) -> usize {
        self.inner.lock_table().map(|t| t.jobs.len()).unwrap_or(0)
    }

    fn admit(
        &self,
        scope: &Scope,
        device: Device,
        commands: Vec<String>,
    ) -> TriageResult<CaptureResponse> {
        let fp = fingerprint(scope, &device.name, &commands);
        let now = Utc::now();

        let job_id = {
            let mut table = self.inner.lock_table()?;

            let mut retry_of = None;
            if let Some(ids) = table.by_fingerprint.get(&fp) {
                if let Some(latest) = ids.last().and_then(|id| table.jobs.get(id)) {
                    if latest.job.status != JobStatus::Failed {
                        debug!("  Fingerprint {} already has job {}", &fp[..12], latest.job.job_id);
                        return Ok(response(&latest.job));
                    }
                    let resubmits = ids.len().saturating_sub(1) as u32;
                    if resubmits >= self.inner.config.max_resubmits {
                        warn!(
                            "  Fingerprint {} exhausted {} resubmits, returning failed job {}",
                            &fp[..12],
                            resubmits,
                            latest.job.job_id
                        );
                        return Ok(response(&latest.job));
                    }
                    retry_of = Some(latest.job.job_id.clone());
                }
            }

            let job_id = Uuid::new_v4().simple().to_string();
            let job = CaptureJob {
                job_id: job_id.clone(),
                fingerprint: fp.clone(),
                scope: scope.clone(),
                host: device.name.clone(),
                commands,
                status: JobStatus::Queued,
                attempts: Vec::new(),
                raw_logs: Vec::new(),
                batches: Vec::new(),
                failure: None,
                retry_of,
                created_at: now,
                updated_at: now,
            };
            let (status_tx, _) = watch::channel(JobStatus::Queued);
            table.jobs.insert(
                job_id.clone(),
                JobEntry {
                    job,
                    device,
                    status_tx,
                },
            );
            table.by_fingerprint.entry(fp).or_default().push(job_id.clone());
            job_id
        };

        info!("  Queued capture job {}", job_id);
        tokio::spawn(Arc::clone(&self.inner).run_job(job_id.clone()));

        Ok(CaptureResponse {
            job_id,
            status: JobStatus::Queued,
        })
    }
}

fn response(job: &CaptureJob) -> CaptureResponse {
    CaptureResponse {
        job_id: job.job_id.clone(),
        status: job.status,
    }
}

/// Deduplicate and check every command is a read-only show command.
fn validate_commands(commands: &[String]) -> TriageResult<Vec<String>> {
    let commands = dedup_commands(commands);
    if commands.is_empty() {
        return Err(TriageError::InvalidCommand("no commands given".to_string()));
    }
    if let Some(bad) = commands.iter().find(|c| !is_read_only(c)) {
        return Err(TriageError::InvalidCommand(format!(
            "'{}' is not a read-only show command",
            bad
        )));
    }
    Ok(commands)
}

impl Inner {
    fn lock_table(&self) -> TriageResult<MutexGuard<'_, JobTable>> {
        self.table
            .lock()
            .map_err(|_| TriageError::Internal("job table lock poisoned".to_string()))
    }

    fn host_lock(&self, host: &str) -> TriageResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .host_locks
            .lock()
            .map_err(|_| TriageError::Internal("host lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(host.to_string()).or_default()))
    }

    /// Mutate a non-terminal job in place.
    fn update<F: FnOnce(&mut CaptureJob)>(&self, job_id: &str, f: F) {
        if let Ok(mut table) = self.lock_table() {
            if let Some(entry) = table.jobs.get_mut(job_id) {
                if !entry.job.status.is_terminal() {
                    f(&mut entry.job);
                    entry.job.updated_at = Utc::now();
                }
            }
        }
    }

    fn set_status(&self, job_id: &str, status: JobStatus) {
        self.update(job_id, |job| job.status = status);
        if let Ok(table) = self.lock_table() {
            if let Some(entry) = table.jobs.get(job_id) {
                entry.status_tx.send_replace(entry.job.status);
            }
        }
    }

    async fn run_job(self: Arc<Self>, job_id: String) {
        let (device, scope, commands) = match self.lock_table() {
            Ok(table) => match table.jobs.get(&job_id) {
                Some(e) => (e.device.clone(), e.job.scope.clone(), e.job.commands.clone()),
                None => return,
            },
            Err(_) => return,
        };

        let ceiling = self.config.job_timeout();
        let outcome = match tokio::time::timeout(
            ceiling,
            self.execute(&job_id, &device, &scope, &commands),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("  Job {} hit the {}s ceiling", job_id, ceiling.as_secs());
                RunOutcome::Failed(JobFailure {
                    kind: FailureKind::Timeout,
                    message: format!("job exceeded {}s", ceiling.as_secs()),
                })
            }
        };

        self.finish(&job_id, outcome);
    }

    async fn execute(
        &self,
        job_id: &str,
        device: &Device,
        scope: &Scope,
        commands: &[String],
    ) -> RunOutcome {
        let lock = match self.host_lock(&device.name) {
            Ok(lock) => lock,
            Err(e) => {
                return RunOutcome::Failed(JobFailure {
                    kind: FailureKind::Transport,
                    message: e.to_string(),
                })
            }
        };
        let _guard = lock.lock().await;
        self.set_status(job_id, JobStatus::Running);
        info!("  Running job {} on {} ({} commands)", job_id, device.name, commands.len());

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for number in 1..=max_attempts {
            if number > 1 {
                let delay = self.config.backoff_before(number);
                debug!("  Job {} backing off {:?} before attempt {}", job_id, delay, number);
                tokio::time::sleep(delay).await;
            }

            let started_at = Utc::now();
            let result = self.attempt(job_id, number, device, scope, commands).await;
            let outcome = match &result {
                Ok((succeeded, failed)) => AttemptOutcome::Completed {
                    succeeded: *succeeded,
                    failed: *failed,
                },
                Err(message) => AttemptOutcome::TransportError {
                    message: message.clone(),
                },
            };
            self.update(job_id, |job| {
                job.attempts.push(CaptureAttempt {
                    number,
                    started_at,
                    finished_at: Utc::now(),
                    outcome,
                })
            });

            match result {
                Ok(_) => return RunOutcome::Completed { attempt: number },
                Err(message) => {
                    warn!(
                        "  Job {} attempt {}/{} transport failure: {}",
                        job_id, number, max_attempts, message
                    );
                    last_error = message;
                }
            }
        }

        RunOutcome::Failed(JobFailure {
            kind: FailureKind::Transport,
            message: format!("{} attempts failed, last: {}", max_attempts, last_error),
        })
    }

    /// One connect-and-run pass. `Err` only for transport failures.
    async fn attempt(
        &self,
        job_id: &str,
        number: u32,
        device: &Device,
        scope: &Scope,
        commands: &[String],
    ) -> Result<(usize, usize), String> {
        let mut session = self
            .executor
            .connect(device)
            .await
            .map_err(|e| e.to_string())?;

        let command_timeout = self.config.command_timeout();
        let mut succeeded = 0;
        let mut failed = 0;

        for (idx, command) in commands.iter().enumerate() {
            let outcome =
                match tokio::time::timeout(command_timeout, session.run(command)).await {
                    Ok(Ok(output)) => match device_error_marker(&output) {
                        Some(marker) => RawOutcome::Failed {
                            reason: error_line(&output, marker),
                        },
                        None => RawOutcome::Captured { output },
                    },
                    Ok(Err(ExecError::Command(reason))) => RawOutcome::Failed { reason },
                    Ok(Err(ExecError::Transport(message))) => {
                        session.close().await;
                        return Err(message);
                    }
                    Err(_) => RawOutcome::Failed {
                        reason: format!("timed out after {}s", command_timeout.as_secs()),
                    },
                };

            if matches!(outcome, RawOutcome::Captured { .. }) {
                succeeded += 1;
            } else {
                failed += 1;
            }

            let raw = RawLog {
                id: format!("{}.{}.{}", job_id, number, idx + 1),
                job_id: job_id.to_string(),
                attempt: number,
                scope: scope.clone(),
                host: device.name.clone(),
                command: command.clone(),
                captured_at: Utc::now(),
                outcome,
            };
            self.writer.append(device, &raw).await;
            self.update(job_id, |job| job.raw_logs.push(raw));
        }

        session.close().await;
        Ok((succeeded, failed))
    }

    fn finish(&self, job_id: &str, outcome: RunOutcome) {
        let (status, failure, batches) = match outcome {
            RunOutcome::Completed { attempt } => {
                let batches: Vec<_> = match self.lock_table() {
                    Ok(table) => table
                        .jobs
                        .get(job_id)
                        .map(|e| {
                            e.job
                                .raw_logs
                                .iter()
                                .filter(|r| r.attempt == attempt && r.is_success())
                                .map(extract)
                                .collect()
                        })
                        .unwrap_or_default(),
                    Err(_) => Vec::new(),
                };
                if batches.is_empty() {
                    (
                        JobStatus::Failed,
                        Some(JobFailure {
                            kind: FailureKind::AllCommandsFailed,
                            message: "every command failed on the device".to_string(),
                        }),
                        batches,
                    )
                } else {
                    (JobStatus::Succeeded, None, batches)
                }
            }
            RunOutcome::Failed(failure) => (JobStatus::Failed, Some(failure), Vec::new()),
        };

        let facts: usize = batches.iter().map(|b| b.facts.len()).sum();
        self.update(job_id, |job| {
            job.batches = batches;
            job.failure = failure;
        });
        self.set_status(job_id, status);

        match status {
            JobStatus::Succeeded => info!("  Job {} succeeded with {} facts", job_id, facts),
            _ => warn!("  Job {} failed", job_id),
        }
    }
}

/// The device line carrying the error marker.
fn error_line(output: &str, marker: &str) -> String {
    output
        .lines()
        .find(|l| l.contains(marker))
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| marker.to_string())
}
