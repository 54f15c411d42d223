//! Fact extractors for router CLI output.
//!
//! `extract` is a pure function from one `RawLog` to one `FactBatch`. The
//! command is classified into a `CommandFamily` and each family has exactly
//! one parser module with the same contract:
//!
//! ```text
//! pub fn parse(output: &str) -> ParsedOutput
//! ```
//!
//! # Families
//!
//! - `bgp_summary`: `show bgp summary`, `show ip bgp summary`
//! - `bgp_table`: `show bgp ipv4 unicast`, `show ip bgp`
//! - `bfd_session`: `show bfd session`, `show bfd neighbors`
//! - `bfd_detail`: `show bfd session detail`
//! - `mpls_forwarding`: `show mpls forwarding`, `show mpls forwarding-table`
//! - `srv6_locator`: `show segment-routing srv6 locator`
//! - `interface`: `show ipv4 interface brief`, `show ip interface brief`
//! - `version`: `show version`
//!
//! # Tolerance
//!
//! Prompt echoes, XR timestamps, rules and blank lines are noise. Lines
//! before a header are context. Unmatched lines in the data region count as
//! residue. Non-empty output with zero facts is flagged low-confidence so
//! callers fall back to showing raw text.

pub mod atoms;
pub mod bfd_detail;
pub mod bfd_session;
pub mod bgp_summary;
pub mod bgp_table;
pub mod interface;
pub mod mpls_forwarding;
pub mod srv6_locator;
pub mod version;

use crate::capture::RawLog;
use crate::commands::CommandFamily;
use crate::facts::{Fact, FactBatch, Protocol, Provenance, StateLabel};
use std::collections::BTreeMap;

/// A fact before it is bound to its RawLog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDraft {
    pub protocol: Protocol,
    pub subject: String,
    pub attributes: BTreeMap<String, String>,
    pub state: StateLabel,
    pub raw_state: String,
}

impl FactDraft {
    pub fn new(protocol: Protocol, subject: impl Into<String>) -> Self {
        Self {
            protocol,
            subject: subject.into(),
            attributes: BTreeMap::new(),
            state: StateLabel::Unknown,
            raw_state: String::new(),
        }
    }

    pub fn with_state(mut self, state: StateLabel, raw: impl Into<String>) -> Self {
        self.state = state;
        self.raw_state = raw.into();
        self
    }

    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set an attribute, skipping empty values.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.attributes.insert(key.to_string(), value);
        }
    }
}

/// Parser result for one output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOutput {
    pub drafts: Vec<FactDraft>,
    pub residue: usize,
}

/// Run the family parser for `output`.
pub fn parse_family(family: CommandFamily, output: &str) -> ParsedOutput {
    match family {
        CommandFamily::BgpSummary => bgp_summary::parse(output),
        CommandFamily::BgpTable => bgp_table::parse(output),
        CommandFamily::BfdSession => bfd_session::parse(output),
        CommandFamily::BfdSessionDetail => bfd_detail::parse(output),
        CommandFamily::MplsForwarding => mpls_forwarding::parse(output),
        CommandFamily::Srv6Locator => srv6_locator::parse(output),
        CommandFamily::InterfaceBrief => interface::parse(output),
        CommandFamily::Version => version::parse(output),
        CommandFamily::Unrecognized => ParsedOutput::default(),
    }
}

/// Turn one RawLog into a FactBatch. Failed captures give an empty batch.
pub fn extract(raw: &RawLog) -> FactBatch {
    let family = CommandFamily::classify(&raw.command);

    let Some(output) = raw.output() else {
        return FactBatch {
            raw_log_id: raw.id.clone(),
            command: raw.command.clone(),
            family,
            facts: Vec::new(),
            unparsed_residue: 0,
            low_confidence: false,
        };
    };

    let parsed = parse_family(family, output);
    let facts: Vec<Fact> = parsed
        .drafts
        .into_iter()
        .enumerate()
        .map(|(idx, draft)| Fact {
            id: format!("{}#{}", raw.id, idx),
            protocol: draft.protocol,
            subject: draft.subject,
            attributes: draft.attributes,
            state: draft.state,
            raw_state: draft.raw_state,
            provenance: Provenance {
                raw_log_id: raw.id.clone(),
                job_id: raw.job_id.clone(),
                host: raw.host.clone(),
                command: raw.command.clone(),
            },
        })
        .collect();

    let low_confidence = match family {
        CommandFamily::Unrecognized => true,
        _ => facts.is_empty() && atoms::has_content(output),
    };

    FactBatch {
        raw_log_id: raw.id.clone(),
        command: raw.command.clone(),
        family,
        facts,
        unparsed_residue: parsed.residue,
        low_confidence,
    }
}
