//! Triage session model: lifecycle states, turns and findings.

use crate::facts::{Protocol, StateLabel};
use crate::scope::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    AwaitingInput,
    Dispatching,
    Analyzing,
    Closed,
}

impl SessionState {
    /// Allowed lifecycle edges. Closed is terminal. `Dispatching ->
    /// AwaitingInput` is taken only when a capture round is abandoned.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Created, AwaitingInput)
                | (Created, Closed)
                | (AwaitingInput, AwaitingInput)
                | (AwaitingInput, Dispatching)
                | (AwaitingInput, Analyzing)
                | (AwaitingInput, Closed)
                | (Dispatching, Analyzing)
                | (Dispatching, AwaitingInput)
                | (Analyzing, AwaitingInput)
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::AwaitingInput => "awaiting_input",
            SessionState::Dispatching => "dispatching",
            SessionState::Analyzing => "analyzing",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnAction {
    Capture,
    /// Re-read of one command section from the show log
    Analyze,
    Clarify,
    Close,
}

/// One operator utterance and the system's reply. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub seq: u32,
    pub user_text: String,
    pub action: TurnAction,
    pub prompt: String,
    pub findings_changed: Vec<FindingKey>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Operator,
    IdleTimeout,
}

/// (host, protocol, subject)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FindingKey {
    pub host: String,
    pub protocol: Protocol,
    pub subject: String,
}

impl fmt::Display for FindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.host, self.protocol, self.subject)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FindingStatus {
    Observed,
    Changed { from: StateLabel },
    Conflicting { states: Vec<StateLabel> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    State,
    /// Capture failed or timed out for the host
    CaptureUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub host: String,
    pub protocol: Protocol,
    pub subject: String,
    pub statement: String,
    pub state: StateLabel,
    pub status: FindingStatus,
    pub kind: FindingKind,
    pub fact_ids: Vec<String>,
    pub revision: u32,
    pub updated_at: DateTime<Utc>,
}

impl Finding {
    pub fn key(&self) -> FindingKey {
        FindingKey {
            host: self.host.clone(),
            protocol: self.protocol,
            subject: self.subject.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaChange {
    Added,
    Changed,
    Conflict,
    Unavailable,
    /// A host that was unavailable answered again; the finding is removed
    Recovered,
}

/// A finding as it changed during one ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingDelta {
    pub change: DeltaChange,
    pub finding: Finding,
}

/// Read-only view of a session returned by `GET /triage/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub scope: Scope,
    pub hosts: Vec<String>,
    pub state: SessionState,
    pub turns: Vec<Turn>,
    pub findings: Vec<Finding>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub close_reason: Option<CloseReason>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_is_terminal() {
        for next in [
            SessionState::Created,
            SessionState::AwaitingInput,
            SessionState::Dispatching,
            SessionState::Analyzing,
            SessionState::Closed,
        ] {
            assert!(!SessionState::Closed.can_transition_to(next));
        }
    }

    #[test]
    fn test_capture_cycle_edges() {
        assert!(SessionState::Created.can_transition_to(SessionState::AwaitingInput));
        assert!(SessionState::AwaitingInput.can_transition_to(SessionState::Dispatching));
        assert!(SessionState::Dispatching.can_transition_to(SessionState::Analyzing));
        assert!(SessionState::Analyzing.can_transition_to(SessionState::AwaitingInput));
        assert!(SessionState::AwaitingInput.can_transition_to(SessionState::Analyzing));
        assert!(SessionState::Dispatching.can_transition_to(SessionState::AwaitingInput));
        assert!(!SessionState::Created.can_transition_to(SessionState::Dispatching));
        assert!(!SessionState::Dispatching.can_transition_to(SessionState::Closed));
        assert!(!SessionState::Analyzing.can_transition_to(SessionState::Closed));
    }

    #[test]
    fn test_finding_status_wire_shape() {
        let json = serde_json::to_value(FindingStatus::Changed {
            from: StateLabel::Up,
        })
        .unwrap();
        assert_eq!(json["status"], "changed");
        assert_eq!(json["from"], "Up");
    }
}
