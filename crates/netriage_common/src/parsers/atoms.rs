//! Shared line classification and token helpers for CLI parsers.
//!
//! Every parser walks its output the same way: noise lines are dropped,
//! lines before the table header are context, and lines inside the data
//! region that match nothing are counted as residue.

use crate::facts::StateLabel;
use regex::Regex;
use std::net::IpAddr;
use std::sync::LazyLock;

/// `RP/0/RP0/CPU0:C-ASBR-1#show bgp summary`
static XR_PROMPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^RP/\d+/[A-Za-z0-9]+/CPU\d+:[^#\s]+#").expect("valid XR prompt regex")
});

/// `C-ASBR-1#show ip bgp summary` or a bare `C-ASBR-1#`
static IOS_PROMPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*[#>]\s*(show\b.*|terminal\b.*)?$")
        .expect("valid IOS prompt regex")
});

/// `Mon Oct 13 10:22:31.123 UTC`
static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(Mon|Tue|Wed|Thu|Fri|Sat|Sun) (Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +\d{1,2} \d{2}:\d{2}:\d{2}(\.\d+)? [A-Z]{2,5}$",
    )
    .expect("valid timestamp regex")
});

static INTERFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z-]*\d+(/\d+)*([./:]\d+)?$").expect("valid interface regex")
});

/// Long interface names and their short IOS-XR forms.
const INTERFACE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("HundredGigE", "Hu"),
    ("FortyGigE", "Fo"),
    ("TwentyFiveGigE", "TF"),
    ("TenGigE", "Te"),
    ("GigabitEthernet", "Gi"),
    ("FastEthernet", "Fa"),
    ("Bundle-Ether", "BE"),
    ("Loopback", "Lo"),
    ("MgmtEth", "Mg"),
];

/// Prompt echo, XR timestamp, separator rule or blank line.
pub fn is_noise(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.chars().all(|c| c == '-' || c == ' ' || c == '=') {
        return true;
    }
    XR_PROMPT_RE.is_match(trimmed) || IOS_PROMPT_RE.is_match(trimmed) || TIMESTAMP_RE.is_match(trimmed)
}

/// True when the output has at least one non-noise line.
pub fn has_content(output: &str) -> bool {
    output.lines().any(|l| !is_noise(l))
}

/// IPv4 or IPv6 host address.
pub fn is_address(token: &str) -> bool {
    token.parse::<IpAddr>().is_ok()
}

/// Address with a `/len` suffix.
pub fn is_prefix(token: &str) -> bool {
    match token.split_once('/') {
        Some((addr, len)) => is_address(addr) && len.parse::<u8>().is_ok(),
        None => false,
    }
}

pub fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

pub fn looks_like_interface(token: &str) -> bool {
    INTERFACE_RE.is_match(token) && !is_address(token)
}

/// `GigabitEthernet0/0/0/0` → `Gi0/0/0/0`. Already-short names pass through.
pub fn short_interface_name(name: &str) -> String {
    for (long, short) in INTERFACE_ABBREVIATIONS {
        if let Some(rest) = name.strip_prefix(long) {
            return format!("{}{}", short, rest);
        }
    }
    name.to_string()
}

/// Case-insensitive lookup in a per-parser state table. Unknown tokens map
/// to `StateLabel::Unknown`.
pub fn map_state(table: &[(&str, StateLabel)], token: &str) -> StateLabel {
    let token = token.trim();
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(token))
        .map(|(_, s)| *s)
        .unwrap_or(StateLabel::Unknown)
}

/// Byte offset of `column` in a header line.
pub fn column_offset(header: &str, column: &str) -> Option<usize> {
    header.find(column)
}

/// Text of `line` from byte `offset`, if the line reaches that far and the
/// offset does not split a token.
pub fn tail_from(line: &str, offset: usize) -> Option<&str> {
    if offset == 0 || offset >= line.len() || !line.is_char_boundary(offset) {
        return None;
    }
    let prev = line.as_bytes()[offset - 1];
    if prev != b' ' && prev != b'\t' {
        return None;
    }
    Some(line[offset..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_lines() {
        assert!(is_noise("RP/0/RP0/CPU0:C-ASBR-1#show bgp summary"));
        assert!(is_noise("RP/0/RSP0/CPU0:PE1#"));
        assert!(is_noise("C-ASBR-1#show ip bgp summary"));
        assert!(is_noise("Mon Oct 13 10:22:31.123 UTC"));
        assert!(is_noise("Thu Jan  2 09:00:00 UTC"));
        assert!(is_noise("------ ----------- -----"));
        assert!(is_noise("   "));
        assert!(!is_noise("Neighbor        Spk    AS MsgRcvd MsgSent"));
        assert!(!is_noise("100.64.231.1      0 65001    1234"));
    }

    #[test]
    fn test_address_helpers() {
        assert!(is_address("100.64.231.1"));
        assert!(is_address("2001:db8::1"));
        assert!(!is_address("Gi0/0/0/0"));
        assert!(is_prefix("10.10.0.0/16"));
        assert!(is_prefix("fcbb:bb00:1::/48"));
        assert!(!is_prefix("10.10.0.0"));
    }

    #[test]
    fn test_interface_helpers() {
        assert!(looks_like_interface("Gi0/0/0/0"));
        assert!(looks_like_interface("GigabitEthernet0/1"));
        assert!(looks_like_interface("Bundle-Ether10"));
        assert!(looks_like_interface("Gi0/0/0/0.100"));
        assert!(!looks_like_interface("100.64.231.1"));
        assert_eq!(short_interface_name("GigabitEthernet0/0/0/0"), "Gi0/0/0/0");
        assert_eq!(short_interface_name("Bundle-Ether10"), "BE10");
        assert_eq!(short_interface_name("Gi0/0/0/0"), "Gi0/0/0/0");
    }

    #[test]
    fn test_map_state_case_insensitive() {
        let table = [("UP", StateLabel::Up), ("DOWN", StateLabel::Down)];
        assert_eq!(map_state(&table, "up"), StateLabel::Up);
        assert_eq!(map_state(&table, "DOWN "), StateLabel::Down);
        assert_eq!(map_state(&table, "FLAPPY"), StateLabel::Unknown);
    }

    #[test]
    fn test_tail_from_respects_token_boundary() {
        let line = "*> 10.10.0.0/16  100.64.231.1   0   0 65001 i";
        let off = line.find("65001").unwrap();
        assert_eq!(tail_from(line, off), Some("65001 i"));
        assert_eq!(tail_from(line, off + 1), None);
        assert_eq!(tail_from("short", 40), None);
    }
}
