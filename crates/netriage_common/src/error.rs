//! Error taxonomy for netriage.
//!
//! Scope errors are caller mistakes and are never retried. Transport and
//! command failures live in the daemon's executor and surface as job state,
//! not as request errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Unknown job: {0}")]
    UnknownJob(String),

    #[error("Nothing captured: {0}")]
    NotCaptured(String),

    #[error("Session {0} is closed")]
    SessionClosed(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error kind reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidScope,
    InvalidHost,
    InvalidCommand,
    UnknownSession,
    UnknownJob,
    NotCaptured,
    SessionClosed,
    Timeout,
    Io,
    Internal,
}

impl TriageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TriageError::InvalidScope(_) => ErrorKind::InvalidScope,
            TriageError::InvalidHost(_) => ErrorKind::InvalidHost,
            TriageError::InvalidCommand(_) => ErrorKind::InvalidCommand,
            TriageError::UnknownSession(_) => ErrorKind::UnknownSession,
            TriageError::UnknownJob(_) => ErrorKind::UnknownJob,
            TriageError::NotCaptured(_) => ErrorKind::NotCaptured,
            TriageError::SessionClosed(_) => ErrorKind::SessionClosed,
            TriageError::Timeout(_) => ErrorKind::Timeout,
            TriageError::Io(_) => ErrorKind::Io,
            TriageError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Caller mistakes: surfaced immediately, never retried.
    pub fn is_scope_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidScope
                | ErrorKind::InvalidHost
                | ErrorKind::InvalidCommand
                | ErrorKind::UnknownSession
                | ErrorKind::UnknownJob
        )
    }
}

pub type TriageResult<T> = Result<T, TriageError>;
