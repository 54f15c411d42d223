//! Normalized facts extracted from captured command output.

use crate::commands::CommandFamily;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Protocol tag carried by every fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Bgp,
    Bfd,
    Mpls,
    Srv6,
    Interface,
    Platform,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Bgp => "BGP",
            Protocol::Bfd => "BFD",
            Protocol::Mpls => "MPLS",
            Protocol::Srv6 => "SRv6",
            Protocol::Interface => "Interface",
            Protocol::Platform => "Platform",
        };
        f.write_str(s)
    }
}

/// Fixed state vocabulary. Device strings map onto it through per-parser
/// tables; the literal token is always kept in `Fact::raw_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateLabel {
    Established,
    Idle,
    Active,
    Up,
    Down,
    Unknown,
}

impl StateLabel {
    /// Healthy means the adjacency/session/path is forwarding.
    pub fn is_healthy(&self) -> bool {
        matches!(self, StateLabel::Established | StateLabel::Up)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, StateLabel::Unknown)
    }
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateLabel::Established => "Established",
            StateLabel::Idle => "Idle",
            StateLabel::Active => "Active",
            StateLabel::Up => "Up",
            StateLabel::Down => "Down",
            StateLabel::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Where a fact came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub raw_log_id: String,
    pub job_id: String,
    pub host: String,
    pub command: String,
}

/// A normalized, protocol-tagged unit of information. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// `<raw_log_id>#<index>`
    pub id: String,
    pub protocol: Protocol,
    /// Neighbor address, interface, locator name...
    pub subject: String,
    pub attributes: BTreeMap<String, String>,
    pub state: StateLabel,
    /// Literal state token as printed by the device
    pub raw_state: String,
    pub provenance: Provenance,
}

impl Fact {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }
}

/// Facts extracted from one RawLog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactBatch {
    pub raw_log_id: String,
    pub command: String,
    pub family: CommandFamily,
    pub facts: Vec<Fact>,
    /// Non-noise lines in the data region that matched no pattern
    pub unparsed_residue: usize,
    /// Non-empty output produced no facts
    pub low_confidence: bool,
}

impl FactBatch {
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}
