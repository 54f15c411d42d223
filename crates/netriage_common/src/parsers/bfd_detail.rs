//! Parser for `show bfd session detail` (IOS-XR).
//!
//! Output is a sequence of blocks, one per session, each opened by an
//! `I/f: <interface>, Location: <slot>` line. The block's first `State:` line
//! carries the session state; the rest is timers and statistics, most of
//! which is recognized and skipped.

use super::atoms::{is_noise, map_state, short_interface_name};
use super::bfd_session::{bfd_subject, STATE_TABLE};
use super::{FactDraft, ParsedOutput};
use crate::facts::Protocol;
use regex::Regex;
use std::sync::LazyLock;

static IF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^I/f:\s*([^,\s]+),\s*Location:\s*(\S+)").expect("valid I/f regex")
});

static STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^State:\s*([A-Za-z_]+)(?:\s+for\s+([^,]+))?(?:,\s*number of times UP:\s*(\d+))?")
        .expect("valid state regex")
});

static MULTIPLIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"multiplier:\s*(\d+)").expect("valid multiplier regex"));

static DETECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"async detection time:\s*(\d+\s*m?s)").expect("valid detection regex")
});

static TX_INTERVAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Local negotiated async tx interval:\s*(\d+\s*m?s)").expect("valid interval regex")
});

/// Block lines that carry nothing we extract.
const KNOWN_PREFIXES: &[&str] = &[
    "Received parameters",
    "Transmitted parameters",
    "Version:",
    "Required echo",
    "My discr",
    "Timer Values",
    "Remote negotiated",
    "Desired echo",
    "Echo detection",
    "Local Stats",
    "Intervals between",
    "Tx:",
    "Rx:",
    "Last packet",
    "Latency of",
    "Number of packets",
    "H/W Offload",
    "Session Flags",
    "Label:",
];

#[derive(Default)]
struct Block {
    interface: String,
    location: String,
    dest: String,
    src: String,
    raw_state: Option<String>,
    up_for: String,
    times_up: String,
    session_type: String,
    multiplier: String,
    detection_time: String,
    tx_interval: String,
    clients: Vec<String>,
    in_owner_section: bool,
}

impl Block {
    fn into_draft(self) -> Option<FactDraft> {
        let raw_state = self.raw_state?;
        if self.dest.is_empty() {
            return None;
        }
        let state = map_state(STATE_TABLE, &raw_state);
        let mut draft = FactDraft::new(Protocol::Bfd, bfd_subject(&self.interface, &self.dest))
            .with_state(state, raw_state);
        draft.set("interface", self.interface);
        draft.set("location", self.location);
        draft.set("peer", self.dest);
        draft.set("source", self.src);
        draft.set("up_for", self.up_for);
        draft.set("times_up", self.times_up);
        draft.set("session_type", self.session_type);
        draft.set("multiplier", self.multiplier);
        draft.set("detection_time", self.detection_time);
        draft.set("tx_interval", self.tx_interval);
        draft.set("clients", self.clients.join(","));
        Some(draft)
    }
}

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut block: Option<Block> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }
        let trimmed = line.trim();

        if let Some(caps) = IF_RE.captures(trimmed) {
            if let Some(done) = block.take() {
                finish(&mut out, done);
            }
            block = Some(Block {
                interface: short_interface_name(&caps[1]),
                location: caps[2].to_string(),
                ..Block::default()
            });
            continue;
        }

        // context before the first block
        let Some(b) = block.as_mut() else {
            continue;
        };

        if !consume_line(b, trimmed) {
            out.residue += 1;
        }
    }

    if let Some(done) = block.take() {
        finish(&mut out, done);
    }
    out
}

fn finish(out: &mut ParsedOutput, block: Block) {
    match block.into_draft() {
        Some(draft) => out.drafts.push(draft),
        None => out.residue += 1,
    }
}

/// Returns false when the line is not understood.
fn consume_line(b: &mut Block, line: &str) -> bool {
    if b.in_owner_section {
        if line.starts_with("Desired") || line.starts_with("Client") {
            return true;
        }
        if let Some(client) = line.split_whitespace().next() {
            b.clients.push(client.to_string());
            return true;
        }
        return false;
    }

    if let Some(dest) = line.strip_prefix("Dest:") {
        b.dest = dest.trim().to_string();
        return true;
    }
    if let Some(src) = line.strip_prefix("Src:") {
        b.src = src.trim().to_string();
        return true;
    }
    if let Some(kind) = line.strip_prefix("Session type:") {
        b.session_type = kind.trim().to_string();
        return true;
    }
    if line.starts_with("Session owner information") {
        b.in_owner_section = true;
        return true;
    }
    if let Some(caps) = STATE_RE.captures(line) {
        // only the first State: line belongs to the session
        if b.raw_state.is_none() {
            b.raw_state = Some(caps[1].to_string());
            if let Some(up_for) = caps.get(2) {
                b.up_for = up_for.as_str().trim().to_string();
            }
            if let Some(times) = caps.get(3) {
                b.times_up = times.as_str().to_string();
            }
        }
        return true;
    }
    if let Some(caps) = TX_INTERVAL_RE.captures(line) {
        b.tx_interval = caps[1].to_string();
        return true;
    }
    if let Some(caps) = DETECTION_RE.captures(line) {
        b.detection_time = caps[1].to_string();
        return true;
    }
    if line.starts_with("Required echo") {
        if b.multiplier.is_empty() {
            if let Some(caps) = MULTIPLIER_RE.captures(line) {
                b.multiplier = caps[1].to_string();
            }
        }
        return true;
    }

    KNOWN_PREFIXES.iter().any(|p| line.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::StateLabel;

    const XR_BFD_DETAIL: &str = r#"RP/0/RP0/CPU0:C-ASBR-1#show bfd session detail
Mon Oct 13 10:22:35.012 UTC
I/f: GigabitEthernet0/0/0/0, Location: 0/0/CPU0
Dest: 100.64.231.1
Src: 100.64.231.2
 State: UP for 0d:2h:13m:40s, number of times UP: 3
 Session type: PR/V4/SH
Received parameters:
 Version: 1, desired tx interval: 150 ms, required rx interval: 150 ms
 Required echo rx interval: 0 ms, multiplier: 3, diag: None
 My discr: 2148532225, your discr: 2148532226, state UP, D/F/P/C/A: 0/0/0/1/0
Transmitted parameters:
 Version: 1, desired tx interval: 150 ms, required rx interval: 150 ms
 Required echo rx interval: 1 ms, multiplier: 3, diag: None
 My discr: 2148532226, your discr: 2148532225, state UP, D/F/P/C/A: 0/0/0/1/0
Timer Values:
 Local negotiated async tx interval: 150 ms
 Remote negotiated async tx interval: 150 ms
 Desired echo tx interval: 0 s, local echo tx interval: 0 ms
 Echo detection time: 0 ms(0 ms*3), async detection time: 450 ms(150 ms*3)
Local Stats:
 Intervals between async packets:
   Tx: Number of intervals=100, min=133 ms, max=150 ms, avg=141 ms
       Last packet transmitted 120 ms ago
   Rx: Number of intervals=100, min=132 ms, max=150 ms, avg=142 ms
       Last packet received 98 ms ago
 Intervals between echo packets:
   Tx: Number of intervals=0, min=0 s, max=0 s, avg=0 s
       Last packet transmitted 0 s ago
   Rx: Number of intervals=0, min=0 s, max=0 s, avg=0 s
       Last packet received 0 s ago
 Latency of echo packets (time between tx and rx):
   Number of packets: 0, min=0 ms, max=0 ms, avg=0 ms
Session owner information:
                            Desired               Adjusted
  Client               Interval   Multiplier Interval   Multiplier
  -------------------- --------------------- ---------------------
  bgp-default          150 ms     3          150 ms     3
"#;

    #[test]
    fn golden_parse_detail_block() {
        let parsed = parse(XR_BFD_DETAIL);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 1);

        let fact = &parsed.drafts[0];
        assert_eq!(fact.subject, "Gi0/0/0/0→100.64.231.1");
        assert_eq!(fact.state, StateLabel::Up);
        assert_eq!(fact.raw_state, "UP");
        assert_eq!(fact.attributes["up_for"], "0d:2h:13m:40s");
        assert_eq!(fact.attributes["times_up"], "3");
        assert_eq!(fact.attributes["source"], "100.64.231.2");
        assert_eq!(fact.attributes["multiplier"], "3");
        assert_eq!(fact.attributes["detection_time"], "450 ms");
        assert_eq!(fact.attributes["tx_interval"], "150 ms");
        assert_eq!(fact.attributes["clients"], "bgp-default");
        assert_eq!(fact.attributes["session_type"], "PR/V4/SH");
    }

    #[test]
    fn test_minimal_state_up_block() {
        let out = "I/f: Gi0/0/0/0, Location: 0/0/CPU0\nDest: 100.64.231.1\nSrc: 100.64.231.2\n State: UP\n";
        let parsed = parse(out);
        assert_eq!(parsed.drafts.len(), 1);
        assert_eq!(parsed.drafts[0].state, StateLabel::Up);
        assert_eq!(parsed.drafts[0].raw_state, "UP");
    }

    #[test]
    fn test_two_blocks_and_unknown_line() {
        let out = "I/f: Gi0/0/0/0, Location: 0/0/CPU0\n\
                   Dest: 100.64.231.1\n\
                   State: DOWN for 0d:0h:0m:12s, number of times UP: 7\n\
                   Something new in this release\n\
                   I/f: Gi0/0/0/1, Location: 0/0/CPU0\n\
                   Dest: 100.64.231.5\n\
                   State: ADMIN_DOWN\n";
        let parsed = parse(out);
        assert_eq!(parsed.drafts.len(), 2);
        assert_eq!(parsed.residue, 1);
        assert_eq!(parsed.drafts[0].state, StateLabel::Down);
        assert_eq!(parsed.drafts[0].attributes["times_up"], "7");
        assert_eq!(parsed.drafts[1].raw_state, "ADMIN_DOWN");
    }

    #[test]
    fn test_block_without_state_is_residue() {
        let out = "I/f: Gi0/0/0/0, Location: 0/0/CPU0\nDest: 100.64.231.1\n";
        let parsed = parse(out);
        assert!(parsed.drafts.is_empty());
        assert_eq!(parsed.residue, 1);
    }
}
