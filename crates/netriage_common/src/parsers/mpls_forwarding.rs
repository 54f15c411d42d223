//! Parser for `show mpls forwarding` (IOS-XR) and `show mpls forwarding-table`
//! (IOS).
//!
//! The two layouts differ in column order:
//! ```text
//! XR:  Local  Outgoing    Prefix             Outgoing     Next Hop        Bytes
//! IOS: Local      Outgoing   Prefix           Bytes Label   Outgoing   Next Hop
//! ```
//! Prefix text may contain spaces (`SR Pfx (idx 1)`), so rows are read from
//! both ends. A row without a local label is another path of the previous
//! label.

use super::atoms::{is_noise, is_number, map_state};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};

const OUTGOING_TABLE: &[(&str, StateLabel)] = &[
    ("Pop", StateLabel::Up),
    ("Exp-Null-v4", StateLabel::Up),
    ("Exp-Null-v6", StateLabel::Up),
    ("Explicit-Null", StateLabel::Up),
    ("Aggregate", StateLabel::Up),
    ("Unlabelled", StateLabel::Down),
    ("Untagged", StateLabel::Down),
    ("No Label", StateLabel::Down),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Xr,
    Ios,
}

struct Row<'a> {
    local: Option<&'a str>,
    outgoing: String,
    prefix: String,
    interface: &'a str,
    next_hop: &'a str,
    bytes: &'a str,
}

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut layout: Option<Layout> = None;
    let mut last_local: Option<String> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        let Some(current) = layout else {
            if trimmed.starts_with("Local") && trimmed.contains("Outgoing") {
                layout = Some(detect_layout(trimmed));
            }
            continue;
        };

        // second header line
        if trimmed.starts_with("Label") {
            continue;
        }

        let tokens = merge_label_words(trimmed.split_whitespace().collect());
        let row = match current {
            Layout::Xr => parse_xr_row(&tokens),
            Layout::Ios => parse_ios_row(&tokens),
        };

        let Some(row) = row else {
            out.residue += 1;
            continue;
        };

        let local = match row.local {
            Some(l) => {
                last_local = Some(l.to_string());
                l.to_string()
            }
            None => match &last_local {
                Some(l) => l.clone(),
                None => {
                    out.residue += 1;
                    continue;
                }
            },
        };

        let state = if is_number(&row.outgoing) {
            StateLabel::Up
        } else {
            map_state(OUTGOING_TABLE, &row.outgoing)
        };

        let draft = FactDraft::new(
            Protocol::Mpls,
            format!("{} via {}", row.prefix, row.interface),
        )
        .attr("local_label", local)
        .attr("outgoing_label", row.outgoing.as_str())
        .attr("prefix", row.prefix.as_str())
        .attr("interface", row.interface)
        .attr("next_hop", row.next_hop)
        .attr("bytes_switched", row.bytes)
        .with_state(state, row.outgoing);
        out.drafts.push(draft);
    }

    out
}

fn detect_layout(header: &str) -> Layout {
    match (header.find("Bytes"), header.find("Next Hop")) {
        (Some(b), Some(n)) if b < n => Layout::Ios,
        _ => Layout::Xr,
    }
}

/// IOS prints `Pop Label` and `No Label` as two words.
fn merge_label_words(tokens: Vec<&str>) -> Vec<String> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if i + 1 < tokens.len() && tokens[i + 1] == "Label" && matches!(tokens[i], "Pop" | "No") {
            let word = if tokens[i] == "Pop" { "Pop" } else { "No Label" };
            merged.push(word.to_string());
            i += 2;
        } else {
            merged.push(tokens[i].to_string());
            i += 1;
        }
    }
    merged
}

/// `[local] outgoing prefix... interface next_hop bytes`
fn parse_xr_row(tokens: &[String]) -> Option<Row<'_>> {
    let n = tokens.len();
    if n < 5 || !is_number(&tokens[n - 1]) {
        return None;
    }
    let (local, start) = if is_number(&tokens[0]) && n >= 6 {
        (Some(tokens[0].as_str()), 1)
    } else {
        (None, 0)
    };
    if n - 3 <= start + 1 {
        return None;
    }
    Some(Row {
        local,
        outgoing: tokens[start].clone(),
        prefix: tokens[start + 1..n - 3].join(" "),
        interface: tokens[n - 3].as_str(),
        next_hop: tokens[n - 2].as_str(),
        bytes: tokens[n - 1].as_str(),
    })
}

/// `[local] outgoing prefix... bytes interface next_hop`
fn parse_ios_row(tokens: &[String]) -> Option<Row<'_>> {
    let n = tokens.len();
    if n < 5 || !is_number(&tokens[n - 3]) {
        return None;
    }
    let (local, start) = if is_number(&tokens[0]) && n >= 6 {
        (Some(tokens[0].as_str()), 1)
    } else {
        (None, 0)
    };
    if n - 3 <= start + 1 {
        return None;
    }
    Some(Row {
        local,
        outgoing: tokens[start].clone(),
        prefix: tokens[start + 1..n - 3].join(" "),
        interface: tokens[n - 2].as_str(),
        next_hop: tokens[n - 1].as_str(),
        bytes: tokens[n - 3].as_str(),
    })
}
