//! Raw log persistence - append-only JSONL plus a markdown show log per host.
//!
//! Layout under the scope's artifact directory:
//!
//! ```text
//! captures/<host>.jsonl   one RawLog per line
//! show_logs/<host>.md     the same records rendered for people
//! ```

use crate::catalog::ScopeCatalog;
use anyhow::{Context, Result};
use netriage_common::showlog::{extract_cmd_output, render_header, render_record};
use netriage_common::{Device, RawLog, Scope};
use std::path::{Path, PathBuf};
use tokio::fs::{create_dir_all, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

const CAPTURES_DIR: &str = "captures";
const SHOW_LOGS_DIR: &str = "show_logs";

#[derive(Debug, Clone)]
pub struct RawLogWriter {
    catalog: ScopeCatalog,
}

impl RawLogWriter {
    pub fn new(catalog: ScopeCatalog) -> Self {
        Self { catalog }
    }

    pub fn captures_path(&self, scope: &Scope, host: &str) -> PathBuf {
        self.catalog
            .artifact_dir(scope)
            .join(CAPTURES_DIR)
            .join(format!("{}.jsonl", host))
    }

    pub fn show_log_path(&self, scope: &Scope, host: &str) -> PathBuf {
        self.catalog
            .artifact_dir(scope)
            .join(SHOW_LOGS_DIR)
            .join(format!("{}.md", host))
    }

    /// Persist one record. Failures are logged; capture results stay in
    /// memory either way.
    pub async fn append(&self, device: &Device, raw: &RawLog) {
        if let Err(e) = self.try_append(device, raw).await {
            error!("  Failed to persist raw log {}: {:#}", raw.id, e);
        }
    }

    async fn try_append(&self, device: &Device, raw: &RawLog) -> Result<()> {
        let json = serde_json::to_string(raw)? + "\n";
        append_text(&self.captures_path(&raw.scope, &raw.host), &json, None).await?;

        let header = render_header(&raw.scope, &raw.host, device.address());
        append_text(
            &self.show_log_path(&raw.scope, &raw.host),
            &render_record(raw),
            Some(&header),
        )
        .await?;

        debug!("  Persisted raw log {} ({})", raw.id, raw.command);
        Ok(())
    }

    /// Body of the latest `## <command>` section in the host's show log.
    /// `None` when the log or the section does not exist.
    pub async fn latest_section(
        &self,
        scope: &Scope,
        host: &str,
        command: &str,
    ) -> Result<Option<String>> {
        let path = self.show_log_path(scope, host);
        if !path.exists() {
            return Ok(None);
        }
        let body = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(extract_cmd_output(&body, command))
    }

    /// Read back every record for a host, skipping unreadable lines.
    pub async fn read_all(&self, scope: &Scope, host: &str) -> Result<Vec<RawLog>> {
        let path = self.captures_path(scope, host);
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

/// Append to `path`, writing `header` first when the file is new.
pub(crate) async fn append_text(path: &Path, text: &str, header: Option<&str>) -> Result<()> {
    if let Some(dir) = path.parent() {
        create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let is_new = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;

    if is_new {
        if let Some(header) = header {
            file.write_all(header.as_bytes()).await?;
        }
    }
    file.write_all(text.as_bytes())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("Failed to sync {}", path.display()))?;

    Ok(())
}
