//! Command identity: normalization, family classification and device error
//! markers.
//!
//! Families are a closed set. Adding a new device command type means adding a
//! variant here and a parser module under `parsers/`.

use crate::facts::Protocol;
use serde::{Deserialize, Serialize};

/// Strings a router prints instead of output when it rejects a command.
pub const DEVICE_ERROR_MARKERS: &[&str] = &[
    "% Invalid input",
    "Unknown command",
    "Incomplete command",
    "Ambiguous command",
    "% Bad IP address",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandFamily {
    BgpSummary,
    BgpTable,
    BfdSession,
    BfdSessionDetail,
    MplsForwarding,
    Srv6Locator,
    InterfaceBrief,
    Version,
    Unrecognized,
}

impl CommandFamily {
    /// Classify a command by its normalized text. Covers IOS and IOS-XR
    /// spellings (`show ip bgp summary` / `show bgp summary`, `show bfd
    /// neighbors` / `show bfd session`, ...).
    pub fn classify(command: &str) -> Self {
        let cmd = normalize_command(command);
        let words: Vec<&str> = cmd.split(' ').collect();

        if words.first() != Some(&"show") {
            return CommandFamily::Unrecognized;
        }

        let has = |w: &str| words.iter().any(|x| *x == w || x.starts_with(w));

        if has("bfd") {
            if has("detail") {
                return CommandFamily::BfdSessionDetail;
            }
            return CommandFamily::BfdSession;
        }

        if has("bgp") {
            if has("summary") {
                return CommandFamily::BgpSummary;
            }
            // neighbor detail, advertised-routes etc. are not tabular tables
            if has("neighbor") || has("community") || has("regexp") {
                return CommandFamily::Unrecognized;
            }
            return CommandFamily::BgpTable;
        }

        if has("mpls") && has("forwarding") {
            return CommandFamily::MplsForwarding;
        }

        if has("srv6") && has("locator") {
            return CommandFamily::Srv6Locator;
        }

        if has("interface") && has("brief") {
            return CommandFamily::InterfaceBrief;
        }

        if words.len() == 2 && words[1] == "version" {
            return CommandFamily::Version;
        }

        CommandFamily::Unrecognized
    }

    pub fn protocol(&self) -> Option<Protocol> {
        match self {
            CommandFamily::BgpSummary | CommandFamily::BgpTable => Some(Protocol::Bgp),
            CommandFamily::BfdSession | CommandFamily::BfdSessionDetail => Some(Protocol::Bfd),
            CommandFamily::MplsForwarding => Some(Protocol::Mpls),
            CommandFamily::Srv6Locator => Some(Protocol::Srv6),
            CommandFamily::InterfaceBrief => Some(Protocol::Interface),
            CommandFamily::Version => Some(Protocol::Platform),
            CommandFamily::Unrecognized => None,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, CommandFamily::Unrecognized)
    }
}

/// Trim, collapse whitespace and lowercase. Router CLIs are case-insensitive.
pub fn normalize_command(cmd: &str) -> String {
    cmd.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalized command *set*: deduplicated and sorted. Used for fingerprints,
/// so submission order does not create a distinct capture.
pub fn normalize_command_set(commands: &[String]) -> Vec<String> {
    let mut set: Vec<String> = commands
        .iter()
        .map(|c| normalize_command(c))
        .filter(|c| !c.is_empty())
        .collect();
    set.sort();
    set.dedup();
    set
}

/// Deduplicate while keeping the first-seen order. This is the execution order.
pub fn dedup_commands(commands: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    let mut out = Vec::new();
    for cmd in commands {
        let trimmed = cmd.split_whitespace().collect::<Vec<_>>().join(" ");
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            out.push(trimmed);
        }
    }
    out
}

/// Only read-only `show` commands may be dispatched to devices.
pub fn is_read_only(cmd: &str) -> bool {
    let norm = normalize_command(cmd);
    norm.starts_with("show ") && !norm.contains('|') && !norm.contains(';')
}

/// First device error marker present in the output, if any.
pub fn device_error_marker(output: &str) -> Option<&'static str> {
    DEVICE_ERROR_MARKERS
        .iter()
        .find(|m| output.contains(*m))
        .copied()
}
