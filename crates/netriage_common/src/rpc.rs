//! HTTP request/response bodies for netriaged.

use crate::capture::{CaptureAttempt, CaptureJob, JobFailure, JobStatus, RawLogRef};
use crate::error::{ErrorKind, TriageError};
use crate::facts::{Fact, FactBatch};
use crate::scope::Scope;
use crate::session::{FindingDelta, SessionState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub scope: Scope,
    pub hosts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    pub session_id: String,
    /// Idle lifetime in minutes
    pub ttl_min: u64,
    pub hosts: Vec<String>,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub session_id: String,
    pub user_text: String,
}

/// Re-read one command's latest show-log section into the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeCommandRequest {
    pub session_id: String,
    pub host: String,
    pub command: String,
}

/// What was sent to one host during an ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub host: String,
    pub commands: Vec<String>,
    pub job_id: String,
    pub status: JobStatus,
}

/// Bounded raw output shown when parsing was not confident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExcerpt {
    pub host: String,
    pub command: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub session_id: String,
    pub state: SessionState,
    pub findings_delta: Vec<FindingDelta>,
    pub prompt: String,
    #[serde(default)]
    pub dispatched: Vec<DispatchSummary>,
    #[serde(default)]
    pub suggested_commands: Vec<String>,
    #[serde(default)]
    pub raw_excerpts: Vec<RawExcerpt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub scope: Scope,
    pub host: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Full job view for `GET /capture/:job_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: String,
    pub host: String,
    pub status: JobStatus,
    pub facts: Vec<Fact>,
    pub raw_refs: Vec<RawLogRef>,
    pub batches: Vec<FactBatch>,
    pub failure: Option<JobFailure>,
    pub attempts: Vec<CaptureAttempt>,
    pub retry_of: Option<String>,
}

impl From<&CaptureJob> for JobView {
    fn from(job: &CaptureJob) -> Self {
        Self {
            job_id: job.job_id.clone(),
            host: job.host.clone(),
            status: job.status,
            facts: job.facts().cloned().collect(),
            raw_refs: job.raw_refs(),
            batches: job.batches.clone(),
            failure: job.failure.clone(),
            attempts: job.attempts.clone(),
            retry_of: job.retry_of.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub sessions: usize,
    pub jobs: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TriageError> for ErrorBody {
    fn from(err: &TriageError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
