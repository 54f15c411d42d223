//! Configuration management for netriaged.
//!
//! Loads settings from `--config`, `$NETRIAGE_CONFIG`, /etc/netriage/config.toml
//! or /var/lib/netriage/config.toml, in that order, or uses defaults.

use anyhow::{Context, Result};
use netriage_common::{CONFIG_PATH, DEFAULT_LISTEN, STATE_CONFIG_PATH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "NETRIAGE_CONFIG";

/// HTTP daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Listen address for the HTTP API
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_filter: default_log_filter(),
        }
    }
}

/// Where scope trees live and where artifacts go inside them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopesConfig {
    /// Root holding `<config_dir>/<task_dir>` trees
    #[serde(default = "default_repo_root")]
    pub repo_root: PathBuf,

    /// Per-task directory for captures, show logs and trial history
    #[serde(default = "default_artifact_subdir")]
    pub artifact_subdir: String,

    /// Inventory file name inside `<repo_root>/<config_dir>`
    #[serde(default = "default_inventory_file")]
    pub inventory_file: String,
}

fn default_repo_root() -> PathBuf {
    PathBuf::from("/srv/netriage/repo")
}

fn default_artifact_subdir() -> String {
    "netriage".to_string()
}

fn default_inventory_file() -> String {
    "devices.yaml".to_string()
}

impl Default for ScopesConfig {
    fn default() -> Self {
        Self {
            repo_root: default_repo_root(),
            artifact_subdir: default_artifact_subdir(),
            inventory_file: default_inventory_file(),
        }
    }
}

/// Device capture: transport, timeouts and retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// ssh client binary
    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    /// Extra arguments placed before the destination
    #[serde(default = "default_ssh_args")]
    pub ssh_args: Vec<String>,

    /// Exit codes that mean the transport failed, not the command
    #[serde(default = "default_transport_exit_codes")]
    pub transport_exit_codes: Vec<i32>,

    /// Per-command timeout in seconds
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Whole-job ceiling in seconds, host lock wait included
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,

    /// Transport attempts per job
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// New jobs allowed for a fingerprint whose latest job failed
    #[serde(default = "default_max_resubmits")]
    pub max_resubmits: u32,
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_ssh_args() -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        "ConnectTimeout=10".to_string(),
    ]
}

fn default_transport_exit_codes() -> Vec<i32> {
    vec![255]
}

fn default_command_timeout() -> u64 {
    20
}

fn default_job_timeout() -> u64 {
    180
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_max_resubmits() -> u32 {
    2
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ssh_program: default_ssh_program(),
            ssh_args: default_ssh_args(),
            transport_exit_codes: default_transport_exit_codes(),
            command_timeout_secs: default_command_timeout(),
            job_timeout_secs: default_job_timeout(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            max_resubmits: default_max_resubmits(),
        }
    }
}

impl CaptureConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Delay before attempt `next` (2-based): `base * 2^(next-2)`.
    pub fn backoff_before(&self, next: u32) -> Duration {
        let exp = next.saturating_sub(2).min(16);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1u64 << exp))
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle minutes before a session is closed
    #[serde(default = "default_ttl_min")]
    pub ttl_min: u64,

    /// Minutes a closed session stays readable before it is dropped
    #[serde(default = "default_retention_min")]
    pub retention_min: u64,

    /// Upper bound for one ingest, dispatch wait included
    #[serde(default = "default_ingest_timeout")]
    pub ingest_timeout_secs: u64,

    /// Idle sweeper period
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Characters of raw output returned when parsing is low-confidence
    #[serde(default = "default_max_excerpt_chars")]
    pub max_excerpt_chars: usize,
}

fn default_ttl_min() -> u64 {
    240
}

fn default_retention_min() -> u64 {
    60
}

fn default_ingest_timeout() -> u64 {
    200
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_excerpt_chars() -> usize {
    2_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_min: default_ttl_min(),
            retention_min: default_retention_min(),
            ingest_timeout_secs: default_ingest_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            max_excerpt_chars: default_max_excerpt_chars(),
        }
    }
}

impl SessionConfig {
    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_secs(self.ingest_timeout_secs)
    }

    pub fn idle_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.ttl_min as i64)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.retention_min as i64)
    }
}

/// Optional language-model narrative
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Ollama base URL
    #[serde(default = "default_assist_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_assist_model")]
    pub model: String,

    #[serde(default = "default_assist_timeout")]
    pub timeout_secs: u64,
}

fn default_assist_endpoint() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_assist_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_assist_timeout() -> u64 {
    8
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_assist_endpoint(),
            model: default_assist_model(),
            timeout_secs: default_assist_timeout(),
        }
    }
}

impl AssistConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Trusted command catalog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// YAML file; built-in catalog when unset
    #[serde(default)]
    pub trusted_commands: Option<PathBuf>,
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub scopes: ScopesConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub assist: AssistConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

impl Config {
    /// Load config. An explicit path must exist and parse; the implicit
    /// chain falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_path(Path::new(&path))
                .with_context(|| format!("{} points to an unusable config", CONFIG_ENV));
        }
        Ok(Self::load_from_path(Path::new(CONFIG_PATH))
            .or_else(|_| Self::load_from_path(Path::new(STATE_CONFIG_PATH)))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            }))
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
