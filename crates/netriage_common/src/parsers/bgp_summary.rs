//! Parser for `show bgp summary` (IOS-XR) and `show ip bgp summary` (IOS).
//!
//! Expected layout after the preamble:
//! ```text
//! Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd
//! 100.64.231.1      0 65001    1234    1230       42    0    0 02:13:45         12
//! 100.64.231.5      0 65003       0       0        0    0    0 00:00:00 Idle
//! ```
//! A numeric last column means Established with that many prefixes.

use super::atoms::{is_address, is_noise, is_number, map_state};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};
use regex::Regex;
use std::sync::LazyLock;

static ROUTER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"BGP router identifier (\S+), local AS number (\S+)").expect("valid router-id regex")
});

const STATE_TABLE: &[(&str, StateLabel)] = &[
    ("Idle", StateLabel::Idle),
    ("Idle (Admin)", StateLabel::Idle),
    ("Idle (PfxCt)", StateLabel::Idle),
    ("Idle (NoNeg)", StateLabel::Idle),
    ("Active", StateLabel::Active),
    ("Connect", StateLabel::Active),
    ("OpenSent", StateLabel::Active),
    ("OpenConfirm", StateLabel::Active),
];

/// Columns before the state column.
const FIXED_COLUMNS: usize = 9;

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut header_seen = false;
    let mut router_id = String::new();
    let mut local_as = String::new();
    let mut wrapped_neighbor: Option<String> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        if !header_seen {
            if let Some(caps) = ROUTER_ID_RE.captures(trimmed) {
                router_id = caps[1].to_string();
                local_as = caps[2].trim_end_matches(',').to_string();
            }
            if is_header(trimmed) {
                header_seen = true;
            }
            continue;
        }

        let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();

        // IPv6 neighbors wrap: address alone, counters on the next line
        if tokens.len() == 1 && is_address(tokens[0]) {
            wrapped_neighbor = Some(tokens[0].to_string());
            continue;
        }
        let joined;
        if let Some(addr) = wrapped_neighbor.take() {
            joined = addr;
            tokens.insert(0, joined.as_str());
        }

        match parse_row(&tokens) {
            Some(mut draft) => {
                draft.set("router_id", router_id.clone());
                draft.set("local_as", local_as.clone());
                out.drafts.push(draft);
            }
            None => out.residue += 1,
        }
    }

    out
}

fn is_header(line: &str) -> bool {
    line.starts_with("Neighbor") && (line.contains("St/PfxRcd") || line.contains("State/PfxRcd"))
}

fn parse_row(tokens: &[&str]) -> Option<FactDraft> {
    if tokens.len() <= FIXED_COLUMNS || !is_address(tokens[0]) {
        return None;
    }
    if !is_number(tokens[2]) {
        return None;
    }

    let raw_state = tokens[FIXED_COLUMNS..].join(" ");
    let mut draft = FactDraft::new(Protocol::Bgp, tokens[0])
        .attr("remote_as", tokens[2])
        .attr("msg_rcvd", tokens[3])
        .attr("msg_sent", tokens[4])
        .attr("up_down", tokens[8]);

    if is_number(&raw_state) {
        draft.set("prefixes_received", raw_state.clone());
        Some(draft.with_state(StateLabel::Established, raw_state))
    } else {
        let state = map_state(STATE_TABLE, &raw_state);
        Some(draft.with_state(state, raw_state))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const XR_BGP_SUMMARY: &str = r#"RP/0/RP0/CPU0:C-ASBR-1#show bgp summary
Mon Oct 13 10:22:31.123 UTC
BGP router identifier 10.0.0.12, local AS number 65002
BGP generic scan interval 60 secs
Non-stop routing is enabled
BGP table state: Active
Table ID: 0xe0000000   RD version: 42
BGP main routing table version 42
BGP NSR Initial initsync version 4 (Reached)
BGP NSR/ISSU Sync-Group versions 0/0
BGP scan interval 60 secs

BGP is operating in STANDALONE mode.


Process       RcvTblVer   bRIB/RIB   LabelVer  ImportVer  SendTblVer  StandbyVer
Speaker              42         42         42         42          42           0

Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd
100.64.231.1      0 65001    1234    1230       42    0    0 02:13:45         12
100.64.231.5      0 65003       0       0        0    0    0 00:00:00 Idle
10.0.0.1          0 65002      55      60       42    0    0 00:45:10 Active
"#;

    const IOS_BGP_SUMMARY: &str = r#"B-ASBR-1#show ip bgp summary
BGP router identifier 10.0.0.11, local AS number 65001
BGP table version is 9, main routing table version 9
4 network entries using 576 bytes of memory

Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
100.64.231.2    4        65002    1230    1234        9    0    0 02:13:44        4
2001:DB8:FFFF:1::2
                4        65002       0       0        1    0    0 never    Idle (Admin)
"#;

    #[test]
    fn golden_parse_xr_summary() {
        let parsed = parse(XR_BGP_SUMMARY);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 3);

        let up = &parsed.drafts[0];
        assert_eq!(up.subject, "100.64.231.1");
        assert_eq!(up.state, StateLabel::Established);
        assert_eq!(up.raw_state, "12");
        assert_eq!(up.attributes["prefixes_received"], "12");
        assert_eq!(up.attributes["remote_as"], "65001");
        assert_eq!(up.attributes["router_id"], "10.0.0.12");
        assert_eq!(up.attributes["local_as"], "65002");

        assert_eq!(parsed.drafts[1].state, StateLabel::Idle);
        assert_eq!(parsed.drafts[1].raw_state, "Idle");
        assert_eq!(parsed.drafts[2].state, StateLabel::Active);
    }

    #[test]
    fn golden_parse_ios_summary_with_wrapped_neighbor() {
        let parsed = parse(IOS_BGP_SUMMARY);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 2);
        assert_eq!(parsed.drafts[0].state, StateLabel::Established);

        let wrapped = &parsed.drafts[1];
        assert_eq!(wrapped.subject, "2001:DB8:FFFF:1::2");
        assert_eq!(wrapped.state, StateLabel::Idle);
        assert_eq!(wrapped.raw_state, "Idle (Admin)");
        assert!(!wrapped.attributes.contains_key("prefixes_received"));
    }

    #[test]
    fn test_unknown_state_keeps_raw_token() {
        let out = "Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd\n\
                   100.64.231.9      0 65009       1       1        0    0    0 00:00:03 Flapping\n";
        let parsed = parse(out);
        assert_eq!(parsed.drafts[0].state, StateLabel::Unknown);
        assert_eq!(parsed.drafts[0].raw_state, "Flapping");
    }

    #[test]
    fn test_rows_without_header_are_context() {
        let out = "100.64.231.1      0 65001    1234    1230       42    0    0 02:13:45         12\n";
        let parsed = parse(out);
        assert!(parsed.drafts.is_empty());
        assert_eq!(parsed.residue, 0);
    }

    #[test]
    fn test_garbage_in_data_region_is_residue() {
        let out = "Neighbor        Spk    AS MsgRcvd MsgSent   TblVer  InQ OutQ  Up/Down  St/PfxRcd\n\
                   % This line is unexpected\n";
        let parsed = parse(out);
        assert_eq!(parsed.residue, 1);
    }
}
