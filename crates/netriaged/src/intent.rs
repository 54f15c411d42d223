//! Intent resolution - turns operator text into a capture plan.
//!
//! `RuleIntentResolver` is deterministic: the same text against the same
//! host set always yields the same intent. Three classes come out of it:
//!
//! - Close: the operator ends the session
//! - Capture: explicit `show ...` commands, or a symptom/protocol
//!   description mapped onto starter commands per host platform
//! - Clarify: nothing actionable, an unknown or unnamed host, or a
//!   command that would change device state

use crate::findings::FindingsBook;
use crate::trusted::TrustedCatalog;
use netriage_common::commands::{is_read_only, CommandFamily};
use netriage_common::{Device, Protocol, SessionState};
use std::sync::Arc;

const CLOSE_PHRASES: &[&str] = &[
    "close",
    "close session",
    "end session",
    "end triage",
    "done",
    "quit",
    "exit",
    "resolved",
    "that's all",
    "bye",
];

/// First words of commands that would change device state.
const MUTATING_VERBS: &[&str] = &[
    "clear", "conf", "configure", "reload", "debug", "undebug", "shutdown", "write", "copy",
    "delete", "commit", "rollback",
];

/// Keyword prefixes naming a tech bucket, in dispatch order.
const TECH_KEYWORDS: &[(&str, &[&str])] = &[
    ("bgp", &["bgp", "neighbor", "neighbour", "peer", "prefix"]),
    ("bfd", &["bfd"]),
    ("mpls", &["mpls", "lsp", "label", "ldp"]),
    ("srv6", &["srv6", "locator", "sid"]),
    ("interfaces", &["interface", "link", "port"]),
    ("platform", &["version", "uptime", "reload", "crash"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symptom {
    Flapping,
    Down,
}

impl Symptom {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symptom::Flapping => "flapping",
            Symptom::Down => "down",
        }
    }
}

/// Commands for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTarget {
    pub host: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Capture {
        targets: Vec<CaptureTarget>,
        symptoms: Vec<Symptom>,
        /// Protocols the operator's text implicates
        protocols: Vec<Protocol>,
    },
    Close,
    Clarify {
        question: String,
        suggestions: Vec<String>,
    },
}

/// Read-only view of the session a resolver works for.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub state: SessionState,
    /// The session's target set
    pub devices: &'a [Device],
    pub findings: &'a FindingsBook,
}

pub trait IntentResolver: Send + Sync {
    fn resolve(&self, text: &str, session: &SessionView<'_>) -> Intent;
}

pub struct RuleIntentResolver {
    catalog: Arc<TrustedCatalog>,
}

impl RuleIntentResolver {
    pub fn new(catalog: Arc<TrustedCatalog>) -> Self {
        Self { catalog }
    }

    fn clarify(&self, question: String, text: &str, hosts: &[Device]) -> Intent {
        let platform = hosts
            .first()
            .map(|d| d.platform())
            .unwrap_or(netriage_common::Platform::Unknown);
        Intent::Clarify {
            question,
            suggestions: self.catalog.select_by_text(text, platform, 3),
        }
    }
}

impl IntentResolver for RuleIntentResolver {
    fn resolve(&self, text: &str, session: &SessionView<'_>) -> Intent {
        let hosts = session.devices;
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return self.clarify(
                "What are you seeing? Describe the symptom or give a show command.".to_string(),
                text,
                hosts,
            );
        }

        let bare = lower.trim_end_matches(['.', '!', '?']).trim();
        if CLOSE_PHRASES.contains(&bare) {
            return Intent::Close;
        }

        let words = tokenize(&lower);

        let first = words
            .iter()
            .copied()
            .find(|w| *w != "run" && *w != "please")
            .unwrap_or_default();
        if MUTATING_VERBS.contains(&first) {
            return self.clarify(
                format!(
                    "'{}' would change device state. Only show commands can be run here.",
                    text.trim()
                ),
                text,
                hosts,
            );
        }

        // target hosts
        let named: Vec<&Device> = hosts
            .iter()
            .filter(|d| {
                let name = d.name.to_lowercase();
                words.iter().any(|w| *w == name)
            })
            .collect();
        if named.is_empty() {
            if let Some(stranger) = host_after_on(&words) {
                return self.clarify(
                    format!(
                        "{} is not part of this session. Hosts here: {}.",
                        stranger,
                        host_list(hosts)
                    ),
                    text,
                    hosts,
                );
            }
        }
        let everyone = words.windows(2).any(|w| w == ["all", "hosts"] || w == ["all", "devices"]);
        let targets: Vec<&Device> = if everyone {
            hosts.iter().collect()
        } else if !named.is_empty() {
            named
        } else if hosts.len() == 1 {
            hosts.iter().collect()
        } else {
            Vec::new()
        };

        // explicit commands win over keyword selection
        let explicit = explicit_commands(text, hosts);
        if let Some(bad) = explicit.iter().find(|c| !is_read_only(c)) {
            return self.clarify(
                format!("'{}' is not a plain show command and cannot be run.", bad),
                text,
                hosts,
            );
        }

        let symptoms = symptoms(&words);
        let mut techs = techs(&words);
        if symptoms.contains(&Symptom::Flapping) {
            if techs.is_empty() {
                techs.push("bgp");
            }
            if !techs.contains(&"bfd") {
                techs.push("bfd");
            }
        }
        if symptoms.contains(&Symptom::Down) && techs.is_empty() {
            techs.push("interfaces");
            techs.push("bgp");
        }
        techs.sort_by_key(|t| TECH_KEYWORDS.iter().position(|(k, _)| k == t));

        if explicit.is_empty() && techs.is_empty() {
            return self.clarify(
                "I could not tell what to check. Name a protocol (BGP, BFD, MPLS, SRv6), a symptom such as flapping or down, or give a show command.".to_string(),
                text,
                hosts,
            );
        }

        if targets.is_empty() {
            return self.clarify(
                format!("Which host should I check? Hosts here: {}.", host_list(hosts)),
                text,
                hosts,
            );
        }

        let mut protocols: Vec<Protocol> = Vec::new();
        let mut plan = Vec::new();
        for device in targets {
            let commands: Vec<String> = if explicit.is_empty() {
                techs
                    .iter()
                    .filter_map(|t| self.catalog.starter(device.platform(), t))
                    .collect()
            } else {
                explicit.clone()
            };
            if commands.is_empty() {
                continue;
            }
            plan.push(CaptureTarget {
                host: device.name.clone(),
                commands,
            });
        }

        if explicit.is_empty() {
            protocols.extend(techs.iter().filter_map(|t| tech_protocol(t)));
        } else {
            for cmd in &explicit {
                if let Some(p) = CommandFamily::classify(cmd).protocol() {
                    if !protocols.contains(&p) {
                        protocols.push(p);
                    }
                }
            }
        }

        if plan.is_empty() {
            return self.clarify(
                "No trusted command covers that on these platforms. Give the show command to run."
                    .to_string(),
                text,
                hosts,
            );
        }

        Intent::Capture {
            targets: plan,
            symptoms,
            protocols,
        }
    }
}

pub fn tech_protocol(tech: &str) -> Option<Protocol> {
    match tech {
        "bgp" => Some(Protocol::Bgp),
        "bfd" => Some(Protocol::Bfd),
        "mpls" => Some(Protocol::Mpls),
        "srv6" => Some(Protocol::Srv6),
        "interfaces" => Some(Protocol::Interface),
        "platform" => Some(Protocol::Platform),
        _ => None,
    }
}

pub fn protocol_tech(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Bgp => "bgp",
        Protocol::Bfd => "bfd",
        Protocol::Mpls => "mpls",
        Protocol::Srv6 => "srv6",
        Protocol::Interface => "interfaces",
        Protocol::Platform => "platform",
    }
}

fn tokenize(lower: &str) -> Vec<&str> {
    lower
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '?' | '!' | '"' | '\'' | '`' | '(' | ')')))
        .filter(|w| !w.is_empty())
        .collect()
}

fn symptoms(words: &[&str]) -> Vec<Symptom> {
    let mut out = Vec::new();
    if words.iter().any(|w| w.starts_with("flap") || *w == "bouncing" || *w == "unstable") {
        out.push(Symptom::Flapping);
    }
    if words
        .iter()
        .any(|w| matches!(*w, "down" | "dropped" | "lost" | "unreachable" | "broken"))
    {
        out.push(Symptom::Down);
    }
    out
}

fn techs(words: &[&str]) -> Vec<&'static str> {
    TECH_KEYWORDS
        .iter()
        .filter(|(_, keys)| words.iter().any(|w| keys.iter().any(|k| w.starts_with(k))))
        .map(|(tech, _)| *tech)
        .collect()
}

/// Router-style name (`C-ASBR-1`, `pe-02`) right after "on".
fn host_after_on<'a>(words: &[&'a str]) -> Option<&'a str> {
    words
        .windows(2)
        .find(|w| w[0] == "on" && looks_like_device_name(w[1]))
        .map(|w| w[1])
}

fn looks_like_device_name(word: &str) -> bool {
    word.contains('-')
        && word.chars().any(|c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn host_list(hosts: &[Device]) -> String {
    hosts
        .iter()
        .map(|d| d.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `show ...` commands in the text, split on `;`, `,` and "and".
/// A trailing "on <host>" is dropped. Commands keep the operator's case;
/// VRF and policy names are case-sensitive on the device.
fn explicit_commands(text: &str, hosts: &[Device]) -> Vec<String> {
    // ASCII folding keeps byte offsets, so spans found here slice `text`
    let folded = text.to_ascii_lowercase();
    let Some(start) = find_show(&folded) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (from, to) in command_spans(&folded, start) {
        let mut cmd = text[from..to]
            .trim()
            .trim_matches(|c: char| matches!(c, '.' | '?' | '!' | '"' | '\'' | '`'))
            .to_string();
        if let Some(pos) = cmd.to_ascii_lowercase().rfind(" on ") {
            let rest = cmd[pos + 4..].trim();
            let is_host = rest.eq_ignore_ascii_case("all hosts")
                || looks_like_device_name(rest)
                || hosts.iter().any(|d| d.name.eq_ignore_ascii_case(rest));
            if is_host {
                cmd.truncate(pos);
            }
        }
        let cmd = cmd.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut words = cmd.split(' ');
        let verb = words.next().unwrap_or("");
        let second = words.next().unwrap_or("").to_ascii_lowercase();
        let seen = out.iter().any(|c: &String| c.eq_ignore_ascii_case(&cmd));
        if verb.eq_ignore_ascii_case("show")
            && !second.is_empty()
            && !matches!(second.as_str(), "me" | "us" | "what")
            && !seen
        {
            out.push(cmd);
        }
    }
    out
}

/// Byte spans of the command pieces from `start`, cut at `;`, `,` and " and ".
fn command_spans(folded: &str, start: usize) -> Vec<(usize, usize)> {
    let bytes = folded.as_bytes();
    let mut spans = Vec::new();
    let mut from = start;
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] == b';' || bytes[i] == b',' {
            spans.push((from, i));
            i += 1;
            from = i;
        } else if bytes[i..].starts_with(b" and ") {
            spans.push((from, i));
            i += 5;
            from = i;
        } else {
            i += 1;
        }
    }
    spans.push((from, bytes.len()));
    spans
}

fn find_show(lower: &str) -> Option<usize> {
    lower.match_indices("show ").map(|(i, _)| i).find(|&i| {
        i == 0
            || lower[..i]
                .chars()
                .last()
                .map(|c| c.is_whitespace() || matches!(c, ':' | '"' | '\'' | '`'))
                .unwrap_or(true)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, device_type: &str) -> Device {
        Device {
            name: name.to_string(),
            device_type: device_type.to_string(),
            hostname: None,
            username: None,
            port: None,
        }
    }

    fn hosts() -> Vec<Device> {
        vec![device("B-ASBR-1", "cisco_ios"), device("C-ASBR-1", "cisco_xr")]
    }

    fn resolver() -> RuleIntentResolver {
        RuleIntentResolver::new(Arc::new(TrustedCatalog::builtin()))
    }

    fn resolve_on(text: &str, devices: &[Device]) -> Intent {
        let book = FindingsBook::new();
        let view = SessionView {
            state: SessionState::AwaitingInput,
            devices,
            findings: &book,
        };
        resolver().resolve(text, &view)
    }

    fn resolve(text: &str) -> Intent {
        resolve_on(text, &hosts())
    }

    #[test]
    fn test_flapping_on_named_host() {
        let intent = resolve("BGP is flapping on C-ASBR-1");
        let Intent::Capture {
            targets,
            symptoms,
            protocols,
        } = intent
        else {
            panic!("expected capture");
        };
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].host, "C-ASBR-1");
        assert_eq!(
            targets[0].commands,
            vec!["show bgp summary".to_string(), "show bfd session".to_string()]
        );
        assert_eq!(symptoms, vec![Symptom::Flapping]);
        assert_eq!(protocols, vec![Protocol::Bgp, Protocol::Bfd]);
    }

    #[test]
    fn test_ios_host_gets_ios_spellings() {
        let intent = resolve("bgp flapping on b-asbr-1");
        let Intent::Capture { targets, .. } = intent else {
            panic!("expected capture");
        };
        assert_eq!(
            targets[0].commands,
            vec!["show ip bgp summary".to_string(), "show bfd neighbors".to_string()]
        );
    }

    #[test]
    fn test_explicit_commands_split_and_host_stripped() {
        let intent = resolve("run show bgp summary; show bfd session detail on C-ASBR-1");
        let Intent::Capture {
            targets, protocols, ..
        } = intent
        else {
            panic!("expected capture");
        };
        assert_eq!(
            targets[0].commands,
            vec![
                "show bgp summary".to_string(),
                "show bfd session detail".to_string()
            ]
        );
        assert_eq!(protocols, vec![Protocol::Bgp, Protocol::Bfd]);
    }

    #[test]
    fn test_explicit_command_keeps_operator_case() {
        let intent = resolve("Show bgp vrf CUST-A summary AND show route-policy PASS-ALL on C-ASBR-1");
        let Intent::Capture { targets, .. } = intent else {
            panic!("expected capture");
        };
        assert_eq!(
            targets[0].commands,
            vec![
                "Show bgp vrf CUST-A summary".to_string(),
                "show route-policy PASS-ALL".to_string()
            ]
        );
    }

    #[test]
    fn test_multiple_hosts_without_name_asks_which() {
        let intent = resolve("bgp is down");
        let Intent::Clarify { question, .. } = intent else {
            panic!("expected clarify");
        };
        assert!(question.contains("Which host"));
    }

    #[test]
    fn test_single_host_session_defaults_target() {
        let only = vec![device("C-ASBR-1", "cisco_xr")];
        let intent = resolve_on("check mpls labels", &only);
        let Intent::Capture { targets, .. } = intent else {
            panic!("expected capture");
        };
        assert_eq!(targets[0].commands, vec!["show mpls forwarding".to_string()]);
    }

    #[test]
    fn test_mutating_command_is_refused() {
        let intent = resolve("clear bgp * on C-ASBR-1");
        assert!(matches!(intent, Intent::Clarify { .. }));
        let intent = resolve("show run | include bgp on C-ASBR-1");
        assert!(matches!(intent, Intent::Clarify { .. }));
    }

    #[test]
    fn test_unknown_host_is_named_back() {
        let intent = resolve("bgp flapping on Z-PE-9");
        let Intent::Clarify { question, .. } = intent else {
            panic!("expected clarify");
        };
        assert!(question.starts_with("z-pe-9 is not part of this session"));
    }

    #[test]
    fn test_close_phrases() {
        assert_eq!(resolve("done."), Intent::Close);
        assert_eq!(resolve("Close session"), Intent::Close);
    }

    #[test]
    fn test_vague_text_clarifies_with_suggestions() {
        let intent = resolve("hello there");
        let Intent::Clarify { suggestions, .. } = intent else {
            panic!("expected clarify");
        };
        assert!(!suggestions.is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let a = resolve("BFD flapping on C-ASBR-1");
        let b = resolve("BFD flapping on C-ASBR-1");
        assert_eq!(a, b);
    }
}
