//! Parser for `show ipv4 interface brief` (IOS-XR) and `show ip interface
//! brief` (IOS).
//!
//! State comes from the protocol column; the admin/status column is kept as
//! an attribute. IOS status can be two words (`administratively down`).

use super::atoms::{is_noise, map_state};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};

const PROTOCOL_TABLE: &[(&str, StateLabel)] = &[
    ("up", StateLabel::Up),
    ("down", StateLabel::Down),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Interface IP-Address Status Protocol Vrf-Name
    Xr,
    /// Interface IP-Address OK? Method Status Protocol
    Ios,
}

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut layout: Option<Layout> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        let Some(current) = layout else {
            if trimmed.starts_with("Interface") && trimmed.contains("IP-Address") {
                layout = Some(if trimmed.contains("OK?") {
                    Layout::Ios
                } else {
                    Layout::Xr
                });
            }
            continue;
        };

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let draft = match current {
            Layout::Xr => parse_xr_row(&tokens),
            Layout::Ios => parse_ios_row(&tokens),
        };
        match draft {
            Some(d) => out.drafts.push(d),
            None => out.residue += 1,
        }
    }

    out
}

fn parse_xr_row(tokens: &[&str]) -> Option<FactDraft> {
    if tokens.len() < 4 {
        return None;
    }
    let protocol = tokens[3];
    let mut draft = FactDraft::new(Protocol::Interface, tokens[0])
        .attr("ip_address", tokens[1])
        .attr("admin_status", tokens[2])
        .with_state(map_state(PROTOCOL_TABLE, protocol), protocol);
    if let Some(vrf) = tokens.get(4) {
        draft.set("vrf", *vrf);
    }
    Some(draft)
}

fn parse_ios_row(tokens: &[&str]) -> Option<FactDraft> {
    if tokens.len() < 6 || !matches!(tokens[2], "YES" | "NO") {
        return None;
    }
    let protocol = tokens[tokens.len() - 1];
    let status = tokens[4..tokens.len() - 1].join(" ");
    Some(
        FactDraft::new(Protocol::Interface, tokens[0])
            .attr("ip_address", tokens[1])
            .attr("method", tokens[3])
            .attr("admin_status", status)
            .with_state(map_state(PROTOCOL_TABLE, protocol), protocol),
    )
}
