//! Parser for SRv6 locator tables (`show segment-routing srv6 locator`,
//! `show isis segment-routing srv6 locators`).

use super::atoms::{is_noise, is_number, is_prefix, map_state};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};

const STATE_TABLE: &[(&str, StateLabel)] = &[
    ("Up", StateLabel::Up),
    ("Active", StateLabel::Up),
    ("Down", StateLabel::Down),
    ("Inactive", StateLabel::Down),
];

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut header_seen = false;
    let mut isis_instance = String::new();

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        if !header_seen {
            // `IS-IS CORE SRv6 Locators`
            if let Some(rest) = trimmed.strip_prefix("IS-IS ") {
                if let Some(instance) = rest.strip_suffix(" SRv6 Locators") {
                    isis_instance = instance.trim().to_string();
                }
            }
            if trimmed.starts_with("Name") && trimmed.contains("Prefix") && trimmed.contains("Status") {
                header_seen = true;
            }
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        if tokens.len() < 5 || !is_number(tokens[1]) || !is_prefix(tokens[3]) {
            out.residue += 1;
            continue;
        }

        let raw_state = tokens[4];
        let mut draft = FactDraft::new(Protocol::Srv6, tokens[0])
            .attr("locator_id", tokens[1])
            .attr("algorithm", tokens[2])
            .attr("prefix", tokens[3])
            .with_state(map_state(STATE_TABLE, raw_state), raw_state);
        if let Some(flags) = tokens.get(5) {
            draft.set("flags", *flags);
        }
        draft.set("isis_instance", isis_instance.clone());
        out.drafts.push(draft);
    }

    out
}
