//! Parser for BGP table output (`show bgp ipv4 unicast`, `show ip bgp`).
//!
//! Rows are positional: status codes occupy the columns before `Network`, and
//! a row whose network column is blank is another path for the previous
//! network. One fact is produced per path, keyed `<network> via <next hop>`.

use super::atoms::{column_offset, is_noise, tail_from};
use super::{FactDraft, ParsedOutput};
use crate::facts::{Protocol, StateLabel};

const ORIGIN_CODES: &[&str] = &["i", "e", "?"];

pub fn parse(output: &str) -> ParsedOutput {
    let mut out = ParsedOutput::default();
    let mut network_col: Option<usize> = None;
    let mut path_col: Option<usize> = None;
    let mut current_network: Option<String> = None;
    let mut pending_codes: Option<String> = None;

    for line in output.lines() {
        if is_noise(line) {
            continue;
        }

        let Some(net_off) = network_col else {
            if line.contains("Network") && line.contains("Next Hop") {
                network_col = column_offset(line, "Network");
                path_col = column_offset(line, "Path");
            }
            continue;
        };

        if is_footer(line.trim()) {
            continue;
        }

        if line.len() <= net_off || !line.is_char_boundary(net_off) {
            out.residue += 1;
            continue;
        }

        let (codes_part, rest) = line.split_at(net_off);
        let mut codes = codes_part.trim().to_string();
        let mut tokens: Vec<&str> = rest.split_whitespace().collect();

        if tokens.is_empty() {
            out.residue += 1;
            continue;
        }

        // Network column present unless the row starts with whitespace there
        let network_present = !rest.starts_with(' ');
        if network_present {
            current_network = Some(tokens.remove(0).to_string());
            if tokens.is_empty() {
                // Long prefix: next hop and attributes wrap to the next line
                pending_codes = Some(codes);
                continue;
            }
        }
        if let Some(saved) = pending_codes.take() {
            if codes.is_empty() {
                codes = saved;
            }
        }

        let Some(network) = current_network.clone() else {
            out.residue += 1;
            continue;
        };

        let next_hop = tokens[0];
        let path_text = path_col.and_then(|off| tail_from(line, off)).unwrap_or("");
        let (as_path, origin) = split_path(path_text);

        let valid = codes.contains('*');
        let state = if valid { StateLabel::Up } else { StateLabel::Down };

        let draft = FactDraft::new(Protocol::Bgp, format!("{} via {}", network, next_hop))
            .attr("network", network.as_str())
            .attr("next_hop", next_hop)
            .attr("best", codes.contains('>').to_string())
            .attr("internal", codes.contains('i').to_string())
            .attr("as_path", as_path)
            .attr("origin", origin)
            .with_state(state, codes);
        out.drafts.push(draft);
    }

    out
}

fn is_footer(line: &str) -> bool {
    line.starts_with("Processed ") || line.starts_with("Total number of prefixes")
}

/// `65003 65001 i` → (`65003 65001`, `i`)
fn split_path(path: &str) -> (String, String) {
    let tokens: Vec<&str> = path.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if ORIGIN_CODES.contains(last) => (rest.join(" "), last.to_string()),
        _ => (tokens.join(" "), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XR_BGP_TABLE: &str = r#"RP/0/RP0/CPU0:C-ASBR-1#show bgp ipv4 unicast
Mon Oct 13 10:22:40.001 UTC
BGP router identifier 10.0.0.12, local AS number 65002
BGP generic scan interval 60 secs
Non-stop routing is enabled
BGP table state: Active
Table ID: 0xe0000000   RD version: 42
BGP main routing table version 42
BGP NSR Initial initsync version 4 (Reached)
BGP NSR/ISSU Sync-Group versions 0/0
BGP scan interval 60 secs

Status codes: s suppressed, d damped, h history, * valid, > best
              i - internal, r RIB-failure, S stale, N Nexthop-discard
Origin codes: i - IGP, e - EGP, ? - incomplete
   Network            Next Hop            Metric LocPrf Weight Path
*> 10.10.0.0/16       100.64.231.1             0             0 65001 i
*                     100.64.231.5             0             0 65003 65001 i
*>i10.20.0.0/16       10.0.0.1                 0    100      0 i
   10.30.0.0/16       100.64.231.9             0             0 65009 ?

Processed 3 prefixes, 4 paths
"#;

    #[test]
    fn golden_parse_xr_table() {
        let parsed = parse(XR_BGP_TABLE);
        assert_eq!(parsed.residue, 0);
        assert_eq!(parsed.drafts.len(), 4);

        let best = &parsed.drafts[0];
        assert_eq!(best.subject, "10.10.0.0/16 via 100.64.231.1");
        assert_eq!(best.state, StateLabel::Up);
        assert_eq!(best.raw_state, "*>");
        assert_eq!(best.attributes["best"], "true");
        assert_eq!(best.attributes["as_path"], "65001");
        assert_eq!(best.attributes["origin"], "i");

        let alt = &parsed.drafts[1];
        assert_eq!(alt.subject, "10.10.0.0/16 via 100.64.231.5");
        assert_eq!(alt.attributes["best"], "false");
        assert_eq!(alt.attributes["as_path"], "65003 65001");

        let internal = &parsed.drafts[2];
        assert_eq!(internal.attributes["network"], "10.20.0.0/16");
        assert_eq!(internal.attributes["internal"], "true");
        assert!(!internal.attributes.contains_key("as_path"));

        let invalid = &parsed.drafts[3];
        assert_eq!(invalid.state, StateLabel::Down);
        assert_eq!(invalid.raw_state, "");
        assert_eq!(invalid.attributes["origin"], "?");
    }

    #[test]
    fn test_wrapped_long_prefix() {
        let out = "   Network            Next Hop            Metric LocPrf Weight Path\n\
                   *> 2001:db8:aaaa:bbbb::/64\n\
                   \x20                     2001:db8::1              0             0 65001 i\n";
        let parsed = parse(out);
        assert_eq!(parsed.drafts.len(), 1);
        assert_eq!(parsed.drafts[0].subject, "2001:db8:aaaa:bbbb::/64 via 2001:db8::1");
        assert_eq!(parsed.drafts[0].raw_state, "*>");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("65003 65001 i"), ("65003 65001".into(), "i".into()));
        assert_eq!(split_path("?"), ("".into(), "?".into()));
        assert_eq!(split_path(""), ("".into(), "".into()));
    }
}
