//! Device execution abstraction.
//!
//! The dispatcher only sees `DeviceExecutor` and `DeviceSession`:
//!
//! - `SshExecutor` drives the system ssh client, one subprocess per command
//! - `FakeDeviceExecutor` returns scripted output and records call counts
//!   and per-host concurrency for assertions
//!
//! Errors are split in two. `Transport` means the device could not be
//! reached or the session dropped; the dispatcher retries the attempt.
//! `Command` means the device answered but the command failed; it is
//! recorded against that command and the set continues.

use crate::config::CaptureConfig;
use async_trait::async_trait;
use netriage_common::commands::normalize_command;
use netriage_common::Device;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("command failed: {0}")]
    Command(String),
}

impl ExecError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ExecError::Transport(_))
    }
}

// ============================================================================
// Executor Traits
// ============================================================================

/// Opens sessions to devices. Stateless per call.
#[async_trait]
pub trait DeviceExecutor: Send + Sync {
    async fn connect(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ExecError>;
}

/// An open device session. Commands run one at a time.
#[async_trait]
pub trait DeviceSession: Send {
    /// Run one command and return its raw text.
    async fn run(&mut self, command: &str) -> Result<String, ExecError>;

    async fn close(&mut self);
}

// ============================================================================
// SSH Executor (Production)
// ============================================================================

pub struct SshExecutor {
    program: String,
    args: Vec<String>,
    transport_exit_codes: Vec<i32>,
}

impl SshExecutor {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            program: config.ssh_program.clone(),
            args: config.ssh_args.clone(),
            transport_exit_codes: config.transport_exit_codes.clone(),
        }
    }
}

#[async_trait]
impl DeviceExecutor for SshExecutor {
    async fn connect(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ExecError> {
        let destination = match &device.username {
            Some(user) => format!("{}@{}", user, device.address()),
            None => device.address().to_string(),
        };
        let mut args = self.args.clone();
        if let Some(port) = device.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        Ok(Box::new(SshSession {
            program: self.program.clone(),
            args,
            destination,
            transport_exit_codes: self.transport_exit_codes.clone(),
        }))
    }
}

struct SshSession {
    program: String,
    args: Vec<String>,
    destination: String,
    transport_exit_codes: Vec<i32>,
}

#[async_trait]
impl DeviceSession for SshSession {
    async fn run(&mut self, command: &str) -> Result<String, ExecError> {
        debug!("  ssh {} '{}'", self.destination, command);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.destination)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::Transport(format!("failed to spawn {}: {}", self.program, e)))?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout).into_owned()),
            Some(code) if self.transport_exit_codes.contains(&code) => Err(ExecError::Transport(
                format!("{} exited {}: {}", self.program, code, stderr),
            )),
            Some(code) => Err(ExecError::Command(format!("exit {}: {}", code, stderr))),
            None => Err(ExecError::Transport(format!(
                "{} terminated by signal",
                self.program
            ))),
        }
    }

    async fn close(&mut self) {}
}

// ============================================================================
// Fake Device Executor (Testing)
// ============================================================================

/// Scripted reply for one (host, command).
#[derive(Debug, Clone)]
pub enum FakeReply {
    Output(String),
    CommandError(String),
    /// Session drops while running this command
    Drop(String),
    /// Never answers; exercises the per-command timeout
    Hang,
}

#[derive(Default)]
struct Counters {
    connects: HashMap<String, usize>,
    runs: HashMap<String, usize>,
    active: HashMap<String, usize>,
    max_active: HashMap<String, usize>,
    connect_failures: HashMap<String, u32>,
}

/// Fake executor with pre-configured replies.
///
/// ```rust,ignore
/// let fake = FakeDeviceExecutor::new()
///     .with_output("C-ASBR-1", "show bfd session", BFD_TABLE)
///     .fail_connects("B-ASBR-1", 2);
/// ```
#[derive(Clone, Default)]
pub struct FakeDeviceExecutor {
    /// (host, normalized command) -> reply
    replies: Arc<HashMap<(String, String), FakeReply>>,
    delay: Duration,
    counters: Arc<Mutex<Counters>>,
}

impl FakeDeviceExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_reply(mut self, host: &str, command: &str, reply: FakeReply) -> Self {
        Arc::make_mut(&mut self.replies).insert((host.to_string(), normalize_command(command)), reply);
        self
    }

    pub fn with_output(self, host: &str, command: &str, output: &str) -> Self {
        self.with_reply(host, command, FakeReply::Output(output.to_string()))
    }

    pub fn with_command_error(self, host: &str, command: &str, message: &str) -> Self {
        self.with_reply(host, command, FakeReply::CommandError(message.to_string()))
    }

    pub fn with_session_drop(self, host: &str, command: &str, message: &str) -> Self {
        self.with_reply(host, command, FakeReply::Drop(message.to_string()))
    }

    pub fn with_hang(self, host: &str, command: &str) -> Self {
        self.with_reply(host, command, FakeReply::Hang)
    }

    /// Refuse the next `count` connects to `host`.
    pub fn fail_connects(self, host: &str, count: u32) -> Self {
        if let Ok(mut c) = self.counters.lock() {
            c.connect_failures.insert(host.to_string(), count);
        }
        self
    }

    /// Sleep this long inside every command.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn connect_count(&self, host: &str) -> usize {
        self.counters
            .lock()
            .map(|c| c.connects.get(host).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn run_count(&self, host: &str) -> usize {
        self.counters
            .lock()
            .map(|c| c.runs.get(host).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Highest number of sessions open at once to `host`.
    pub fn max_concurrency(&self, host: &str) -> usize {
        self.counters
            .lock()
            .map(|c| c.max_active.get(host).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl DeviceExecutor for FakeDeviceExecutor {
    async fn connect(&self, device: &Device) -> Result<Box<dyn DeviceSession>, ExecError> {
        let host = device.name.clone();
        {
            let mut c = self
                .counters
                .lock()
                .map_err(|_| ExecError::Transport("fake counters poisoned".to_string()))?;
            *c.connects.entry(host.clone()).or_insert(0) += 1;

            if let Some(left) = c.connect_failures.get_mut(&host) {
                if *left > 0 {
                    *left -= 1;
                    return Err(ExecError::Transport(format!("connection to {} refused", host)));
                }
            }

            let active = c.active.entry(host.clone()).or_insert(0);
            *active += 1;
            let now = *active;
            let max = c.max_active.entry(host.clone()).or_insert(0);
            *max = (*max).max(now);
        }

        Ok(Box::new(FakeSession {
            host,
            replies: Arc::clone(&self.replies),
            delay: self.delay,
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct FakeSession {
    host: String,
    replies: Arc<HashMap<(String, String), FakeReply>>,
    delay: Duration,
    counters: Arc<Mutex<Counters>>,
}

#[async_trait]
impl DeviceSession for FakeSession {
    async fn run(&mut self, command: &str) -> Result<String, ExecError> {
        if let Ok(mut c) = self.counters.lock() {
            *c.runs.entry(self.host.clone()).or_insert(0) += 1;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let key = (self.host.clone(), normalize_command(command));
        match self.replies.get(&key) {
            Some(FakeReply::Output(text)) => Ok(text.clone()),
            Some(FakeReply::CommandError(msg)) => Err(ExecError::Command(msg.clone())),
            Some(FakeReply::Drop(msg)) => Err(ExecError::Transport(msg.clone())),
            Some(FakeReply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExecError::Command("hang released".to_string()))
            }
            None => Ok(String::new()),
        }
    }

    async fn close(&mut self) {}
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        if let Ok(mut c) = self.counters.lock() {
            if let Some(active) = c.active.get_mut(&self.host) {
                *active = active.saturating_sub(1);
            }
        }
    }
}
