//! Trial history - per-scope JSONL record of session events.

use crate::catalog::ScopeCatalog;
use crate::raw_log::append_text;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use netriage_common::{CloseReason, Scope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::error;

const HISTORY_FILE: &str = "trial_history.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HistoryEvent {
    Start {
        hosts: Vec<String>,
    },
    /// Commands chosen for a host, before dispatch
    Proposal {
        host: String,
        commands: Vec<String>,
        user_text: String,
    },
    Dispatch {
        host: String,
        job_id: String,
        status: String,
    },
    Clarify {
        user_text: String,
        question: String,
    },
    /// A show-log section re-read into the session
    Analyze {
        host: String,
        command: String,
        follow_ups: Vec<String>,
    },
    Close {
        reason: CloseReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub at: DateTime<Utc>,
    pub session_id: String,
    #[serde(flatten)]
    pub event: HistoryEvent,
}

#[derive(Debug, Clone)]
pub struct TrialHistory {
    catalog: ScopeCatalog,
}

impl TrialHistory {
    pub fn new(catalog: ScopeCatalog) -> Self {
        Self { catalog }
    }

    pub fn path(&self, scope: &Scope) -> PathBuf {
        self.catalog.artifact_dir(scope).join(HISTORY_FILE)
    }

    pub async fn record(&self, scope: &Scope, session_id: &str, event: HistoryEvent) {
        let record = HistoryRecord {
            at: Utc::now(),
            session_id: session_id.to_string(),
            event,
        };
        let result = match serde_json::to_string(&record) {
            Ok(json) => append_text(&self.path(scope), &(json + "\n"), None).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            error!("  Failed to write trial history for {}: {:#}", scope, e);
        }
    }

    /// Markdown transcript of one session.
    pub fn transcript_path(&self, scope: &Scope, session_id: &str) -> PathBuf {
        self.catalog
            .artifact_dir(scope)
            .join(format!("triage_session_{}.md", session_id))
    }

    /// Append one analyzed command section to the session transcript.
    pub async fn append_transcript(
        &self,
        scope: &Scope,
        session_id: &str,
        host: &str,
        command: &str,
        output: &str,
    ) {
        let header = format!("# Triage session {} ({})\n", session_id, scope);
        let entry = format!(
            "\n### Host: {} | Command: {}\n\n```\n{}\n```\n",
            host,
            command,
            output.trim()
        );
        let path = self.transcript_path(scope, session_id);
        if let Err(e) = append_text(&path, &entry, Some(&header)).await {
            error!("  Failed to append transcript {}: {:#}", path.display(), e);
        }
    }

    pub async fn read_all(&self, scope: &Scope) -> Result<Vec<HistoryRecord>> {
        let path = self.path(scope);
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(content
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
