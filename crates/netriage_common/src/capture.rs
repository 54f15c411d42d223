//! Capture jobs and raw logs.

use crate::commands::normalize_command_set;
use crate::facts::{Fact, FactBatch};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, auth failure, session dropped; retries exhausted
    Transport,
    /// Overall job ceiling reached
    Timeout,
    /// Session worked but every command failed on the device
    AllCommandsFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Completed { succeeded: usize, failed: usize },
    TransportError { message: String },
}

/// One transport-level try of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureAttempt {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RawOutcome {
    Captured { output: String },
    Failed { reason: String },
}

/// Captured text of one command execution. Write-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    pub id: String,
    pub job_id: String,
    pub attempt: u32,
    pub scope: Scope,
    pub host: String,
    pub command: String,
    pub captured_at: DateTime<Utc>,
    pub outcome: RawOutcome,
}

impl RawLog {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RawOutcome::Captured { .. })
    }

    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            RawOutcome::Captured { output } => Some(output),
            RawOutcome::Failed { .. } => None,
        }
    }

    pub fn to_ref(&self) -> RawLogRef {
        RawLogRef {
            id: self.id.clone(),
            command: self.command.clone(),
            attempt: self.attempt,
            success: self.is_success(),
            captured_at: self.captured_at,
        }
    }
}

/// Lightweight pointer to a RawLog for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRef {
    pub id: String,
    pub command: String,
    pub attempt: u32,
    pub success: bool,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureJob {
    pub job_id: String,
    pub fingerprint: String,
    pub scope: Scope,
    pub host: String,
    /// Execution order, deduplicated
    pub commands: Vec<String>,
    pub status: JobStatus,
    pub attempts: Vec<CaptureAttempt>,
    pub raw_logs: Vec<RawLog>,
    pub batches: Vec<FactBatch>,
    pub failure: Option<JobFailure>,
    /// Previous failed job this one retries
    pub retry_of: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CaptureJob {
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.batches.iter().flat_map(|b| b.facts.iter())
    }

    pub fn raw_refs(&self) -> Vec<RawLogRef> {
        self.raw_logs.iter().map(RawLog::to_ref).collect()
    }

    pub fn failed_raw_logs(&self) -> impl Iterator<Item = &RawLog> {
        self.raw_logs.iter().filter(|r| !r.is_success())
    }
}

/// Deterministic identity of a capture request.
pub fn fingerprint(scope: &Scope, host: &str, commands: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.config_dir.as_bytes());
    hasher.update([0u8]);
    hasher.update(scope.task_dir.as_bytes());
    hasher.update([0u8]);
    hasher.update(host.trim().as_bytes());
    hasher.update([0u8]);
    for cmd in normalize_command_set(commands) {
        hasher.update(cmd.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
