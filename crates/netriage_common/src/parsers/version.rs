//! Parser for `show version`.
//!
//! Produces a single Platform fact from the `<name> uptime is ...` line, with
//! OS, version and model as attributes. There is no table, so every other
//! non-noise line counts as residue.

use super::atoms::is_noise;
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};
use regex::Regex;
use std::sync::LazyLock;

/// `Cisco IOS XR Software, Version 7.5.2` or
/// `Cisco IOS Software, IOSv Software (VIOS-ADVENTERPRISEK9-M), Version 15.9(3)M2, RELEASE SOFTWARE (fc1)`
static SOFTWARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Cisco (IOS XR|IOS XE|IOS)\b.*?Software.*?, Version ([^\s,]+)")
        .expect("valid software regex")
});

static UPTIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+) uptime is (.+)$").expect("valid uptime regex"));

/// `cisco IOS-XRv 9000 () processor`, `Cisco IOSv (revision 1.0) with ...`
static MODEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i:cisco) (.+?)\s*(?:\(.*)?\s+(?:processor|with)\b").expect("valid model regex")
});

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut os = String::new();
    let mut version = String::new();
    let mut model = String::new();
    let mut uptime: Option<(String, String)> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        if let Some(caps) = SOFTWARE_RE.captures(trimmed) {
            if os.is_empty() {
                os = caps[1].to_string();
                version = caps[2].to_string();
            }
            continue;
        }
        if let Some(caps) = UPTIME_RE.captures(trimmed) {
            if uptime.is_none() {
                uptime = Some((caps[1].to_string(), caps[2].trim().to_string()));
            }
            continue;
        }
        if model.is_empty() {
            if let Some(caps) = MODEL_RE.captures(trimmed) {
                model = caps[1].trim().to_string();
                continue;
            }
        }
        out.residue += 1;
    }

    if let Some((name, text)) = uptime {
        let subject = if name == "System" { "system".to_string() } else { name };
        let mut draft = FactDraft::new(Protocol::Platform, subject).with_state(StateLabel::Up, text.clone());
        draft.set("uptime", text);
        draft.set("os", os);
        draft.set("version", version);
        draft.set("model", model);
        out.drafts.push(draft);
    }

    out
}
