//! Markdown show-log format.
//!
//! A show log is one file per host:
//!
//! ```text
//! # Full Output for configs.5/task-18.bfd
//! **Device:** C-ASBR-1 (10.0.0.12)
//!
//! ## show bfd session
//!
//! _job 3f2a... attempt 1, 2026-10-16T09:12:03Z_
//!
//! ```
//! <device output>
//! ```
//! ```
//!
//! Records are only ever appended, so the same command can appear several
//! times. Extraction returns the latest section.

use crate::capture::{RawLog, RawOutcome};
use crate::scope::Scope;
use regex::Regex;
use std::sync::LazyLock;

const FENCE: &str = "```";

/// Prefix of a section body whose capture failed.
pub const FAILED_MARKER: &str = "[capture failed]";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^##[ \t]*(.+?)[ \t]*$").expect("valid header regex"));

static FENCED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)```").expect("valid fence regex"));

/// File preamble, written once when the show log is created.
pub fn render_header(scope: &Scope, host: &str, address: &str) -> String {
    format!(
        "# Full Output for {}\n**Device:** {} ({})\n\n",
        scope, host, address
    )
}

/// One command section.
pub fn render_record(raw: &RawLog) -> String {
    let body = match &raw.outcome {
        RawOutcome::Captured { output } => output.trim().to_string(),
        RawOutcome::Failed { reason } => format!("{} {}", FAILED_MARKER, reason.trim()),
    };
    format!(
        "## {}\n\n_job {} attempt {}, {}_\n\n{FENCE}\n{}\n{FENCE}\n\n",
        raw.command,
        raw.job_id,
        raw.attempt,
        raw.captured_at.to_rfc3339(),
        body
    )
}

/// Output of the latest `## <command>` section, taken from its first fenced
/// block. Header match is exact after trimming; `None` when the header or
/// its block is missing.
pub fn extract_cmd_output(body: &str, command: &str) -> Option<String> {
    let wanted = command.trim();
    let headers: Vec<_> = HEADER_RE.captures_iter(body).collect();

    let idx = headers
        .iter()
        .rposition(|c| c.get(1).map(|m| m.as_str().trim()) == Some(wanted))?;

    let start = headers[idx].get(0)?.end();
    let end = headers
        .get(idx + 1)
        .and_then(|c| c.get(0))
        .map(|m| m.start())
        .unwrap_or(body.len());

    let section = &body[start..end];
    FENCED_RE
        .captures(section)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
