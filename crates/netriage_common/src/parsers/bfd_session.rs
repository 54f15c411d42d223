//! Parser for `show bfd session` (IOS-XR) and `show bfd neighbors` (IOS).
//!
//! IOS-XR prints a two-line header and a second line per session carrying the
//! H/W and NPU columns:
//! ```text
//! Interface           Dest Addr           Local det time(int*mult)      State
//!                                     Echo             Async   H/W   NPU
//! ------------------- --------------- ---------------- ---------------- ----------
//! Gi0/0/0/0           100.64.231.1    0s(0s*0)         450ms(150ms*3)   UP
//!                                                                  No    n/a
//! ```
//! IOS prints one line per neighbor:
//! ```text
//! NeighAddr                              LD/RD         RH/RS     State     Int
//! 10.1.1.2                                1/1          Up        Up        Gi0/1
//! ```
//! Subjects are `<interface>→<address>`.

use super::atoms::{is_address, is_noise, map_state};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};

pub(crate) const STATE_TABLE: &[(&str, StateLabel)] = &[
    ("UP", StateLabel::Up),
    ("DOWN", StateLabel::Down),
    ("ADMIN_DOWN", StateLabel::Down),
    ("ADMINDOWN", StateLabel::Down),
    ("INIT", StateLabel::Down),
    ("FAIL", StateLabel::Down),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Xr,
    Ios,
}

pub fn bfd_subject(interface: &str, address: &str) -> String {
    format!("{}→{}", interface, address)
}

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut layout: Option<Layout> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();
        let tokens: Vec<&str> = trimmed.split_whitespace().collect();

        let Some(current) = layout else {
            if trimmed.starts_with("Interface") && trimmed.contains("Dest Addr") {
                layout = Some(Layout::Xr);
            } else if trimmed.starts_with("NeighAddr") {
                layout = Some(Layout::Ios);
            }
            continue;
        };

        match current {
            Layout::Xr => {
                if trimmed.starts_with("Echo") {
                    continue;
                }
                if let Some(draft) = parse_xr_row(&tokens) {
                    out.drafts.push(draft);
                } else if is_hw_continuation(&tokens) {
                    if let Some(last) = out.drafts.last_mut() {
                        last.set("hw_offload", tokens[0]);
                        last.set("npu", tokens[1]);
                    } else {
                        out.residue += 1;
                    }
                } else {
                    out.residue += 1;
                }
            }
            Layout::Ios => {
                // address-family banners repeat between tables
                if trimmed.ends_with("Sessions") {
                    continue;
                }
                if trimmed.starts_with("NeighAddr") {
                    continue;
                }
                match parse_ios_row(&tokens) {
                    Some(draft) => out.drafts.push(draft),
                    None => out.residue += 1,
                }
            }
        }
    }

    out
}

fn parse_xr_row(tokens: &[&str]) -> Option<FactDraft> {
    if tokens.len() < 5 || !is_address(tokens[1]) {
        return None;
    }
    let raw_state = tokens[tokens.len() - 1];
    let state = map_state(STATE_TABLE, raw_state);
    Some(
        FactDraft::new(Protocol::Bfd, bfd_subject(tokens[0], tokens[1]))
            .attr("interface", tokens[0])
            .attr("peer", tokens[1])
            .attr("echo_detect", tokens[2])
            .attr("async_detect", tokens[3])
            .with_state(state, raw_state),
    )
}

fn is_hw_continuation(tokens: &[&str]) -> bool {
    tokens.len() == 2 && matches!(tokens[0], "Yes" | "No")
}

fn parse_ios_row(tokens: &[&str]) -> Option<FactDraft> {
    if tokens.len() < 5 || !is_address(tokens[0]) {
        return None;
    }
    let raw_state = tokens[3];
    let state = map_state(STATE_TABLE, raw_state);
    Some(
        FactDraft::new(Protocol::Bfd, bfd_subject(tokens[4], tokens[0]))
            .attr("interface", tokens[4])
            .attr("peer", tokens[0])
            .attr("ld_rd", tokens[1])
            .attr("rh_rs", tokens[2])
            .with_state(state, raw_state),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const XR_BFD_SESSION: &str = r#"RP/0/RP0/CPU0:C-ASBR-1#show bfd session
Mon Oct 13 10:22:33.456 UTC
Interface           Dest Addr           Local det time(int*mult)      State
                                    Echo             Async   H/W   NPU
------------------- --------------- ---------------- ---------------- ----------
Gi0/0/0/0           100.64.231.1    0s(0s*0)         450ms(150ms*3)   UP
                                                                 No    n/a
Gi0/0/0/1           100.64.231.5    0s(0s*0)         450ms(150ms*3)   DOWN
                                                                 No    n/a
"#;

    const IOS_BFD_NEIGHBORS: &str = r#"B-ASBR-1#show bfd neighbors

IPv4 Sessions
NeighAddr                              LD/RD         RH/RS     State     Int
100.64.231.2                            1/2          Up        Up        Gi0/1
100.64.231.6                            2/0          Down      Down      Gi0/2
"#;

    #[test]
    fn golden_parse_xr_sessions() {
        let parsed = parse(XR_BFD_SESSION);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 2);

        let up = &parsed.drafts[0];
        assert_eq!(up.subject, "Gi0/0/0/0→100.64.231.1");
        assert_eq!(up.state, StateLabel::Up);
        assert_eq!(up.raw_state, "UP");
        assert_eq!(up.attributes["async_detect"], "450ms(150ms*3)");
        assert_eq!(up.attributes["hw_offload"], "No");
        assert_eq!(up.attributes["npu"], "n/a");

        assert_eq!(parsed.drafts[1].state, StateLabel::Down);
        assert_eq!(parsed.drafts[1].raw_state, "DOWN");
    }

    #[test]
    fn golden_parse_ios_neighbors() {
        let parsed = parse(IOS_BFD_NEIGHBORS);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 2);
        assert_eq!(parsed.drafts[0].subject, "Gi0/1→100.64.231.2");
        assert_eq!(parsed.drafts[0].state, StateLabel::Up);
        assert_eq!(parsed.drafts[1].state, StateLabel::Down);
    }

    #[test]
    fn test_init_and_unknown_states() {
        let out = "Interface           Dest Addr           Local det time(int*mult)      State\n\
                   Gi0/0/0/2           100.64.231.9    0s(0s*0)         450ms(150ms*3)   INIT\n\
                   Gi0/0/0/3           100.64.231.13   0s(0s*0)         450ms(150ms*3)   WEIRD\n";
        let parsed = parse(out);
        assert_eq!(parsed.drafts[0].state, StateLabel::Down);
        assert_eq!(parsed.drafts[0].raw_state, "INIT");
        assert_eq!(parsed.drafts[1].state, StateLabel::Unknown);
        assert_eq!(parsed.drafts[1].raw_state, "WEIRD");
    }
}
