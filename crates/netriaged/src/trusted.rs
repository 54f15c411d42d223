//! Trusted show-command catalog.
//!
//! YAML shape is `vendor -> platform -> tech -> [commands]`:
//!
//! ```yaml
//! cisco:
//!   iosxr:
//!     bgp: ["show bgp summary", "show bgp ipv4 unicast"]
//!     bfd: ["show bfd session"]
//! ```
//!
//! The first command of a tech bucket is its starter, used when a symptom
//! names the tech. A built-in catalog covers IOS-XR and IOS spellings.

use anyhow::{Context, Result};
use netriage_common::commands::{is_read_only, normalize_command};
use netriage_common::Platform;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

type Tree = BTreeMap<String, BTreeMap<String, BTreeMap<String, Vec<String>>>>;

/// Words in operator text that point at a tech bucket. Hits score +2.
const TECH_ALIASES: &[(&str, &[&str])] = &[
    ("bgp", &["neighbor", "peer", "prefix"]),
    ("bfd", &["flap", "flapping", "detection"]),
    ("mpls", &["lsp", "label", "ldp"]),
    ("srv6", &["locator", "sid"]),
    ("interfaces", &["interface", "link", "port"]),
    ("platform", &["version", "uptime", "reload"]),
];

const BUILTIN: &[(&str, &str, &[&str])] = &[
    ("iosxr", "bgp", &["show bgp summary", "show bgp ipv4 unicast"]),
    ("iosxr", "bfd", &["show bfd session", "show bfd session detail"]),
    ("iosxr", "mpls", &["show mpls forwarding"]),
    (
        "iosxr",
        "srv6",
        &["show segment-routing srv6 locator", "show isis segment-routing srv6 locators"],
    ),
    ("iosxr", "interfaces", &["show ipv4 interface brief"]),
    ("iosxr", "platform", &["show version"]),
    ("iosxe", "bgp", &["show ip bgp summary", "show ip bgp"]),
    ("iosxe", "bfd", &["show bfd neighbors"]),
    ("iosxe", "mpls", &["show mpls forwarding-table"]),
    ("iosxe", "interfaces", &["show ip interface brief"]),
    ("iosxe", "platform", &["show version"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedCommand {
    pub vendor: String,
    pub platform: String,
    pub tech: String,
    pub command: String,
}

#[derive(Debug, Clone)]
pub struct TrustedCatalog {
    entries: Vec<TrustedCommand>,
}

impl Default for TrustedCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TrustedCatalog {
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .flat_map(|(platform, tech, cmds)| {
                cmds.iter().map(move |cmd| TrustedCommand {
                    vendor: "cisco".to_string(),
                    platform: platform.to_string(),
                    tech: tech.to_string(),
                    command: cmd.to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Load from YAML, or the built-in catalog when no path is configured.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trusted commands {}", path.display()))?;
        let catalog = Self::from_yaml(&text)
            .with_context(|| format!("Failed to parse trusted commands {}", path.display()))?;
        info!(
            "Loaded {} trusted commands from {}",
            catalog.entries.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let tree: Tree = serde_yaml::from_str(text)?;
        let mut entries = Vec::new();
        for (vendor, platforms) in tree {
            for (platform, techs) in platforms {
                for (tech, cmds) in techs {
                    for cmd in cmds {
                        let cmd = cmd.trim().to_string();
                        if cmd.is_empty() {
                            continue;
                        }
                        if !is_read_only(&cmd) {
                            warn!("Ignoring non-show trusted command: {}", cmd);
                            continue;
                        }
                        entries.push(TrustedCommand {
                            vendor: vendor.trim().to_lowercase(),
                            platform: normalize_platform(&platform),
                            tech: tech.trim().to_lowercase(),
                            command: cmd,
                        });
                    }
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn for_platform(&self, platform: Platform) -> impl Iterator<Item = &TrustedCommand> {
        let key = platform_key(platform);
        self.entries.iter().filter(move |e| e.platform == key)
    }

    /// All commands of one tech bucket, catalog order.
    pub fn commands_for(&self, platform: Platform, tech: &str) -> Vec<String> {
        self.for_platform(platform)
            .filter(|e| e.tech == tech)
            .map(|e| e.command.clone())
            .collect()
    }

    /// First command of a tech bucket.
    pub fn starter(&self, platform: Platform, tech: &str) -> Option<String> {
        self.for_platform(platform)
            .find(|e| e.tech == tech)
            .map(|e| e.command.clone())
    }

    /// Is this exact command (normalized) in the catalog for the platform?
    pub fn is_trusted(&self, platform: Platform, command: &str) -> Option<&str> {
        let wanted = normalize_command(command);
        self.for_platform(platform)
            .find(|e| normalize_command(&e.command) == wanted)
            .map(|e| e.tech.as_str())
    }

    /// Score commands against operator text: +2 per alias hit, +1 when the
    /// tech name itself appears. Nothing scoring falls back to interface and
    /// BGP starters.
    pub fn select_by_text(&self, text: &str, platform: Platform, limit: usize) -> Vec<String> {
        let text = text.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '-')
            .filter(|w| !w.is_empty())
            .collect();

        let mut scored: Vec<(u32, usize, &TrustedCommand)> = Vec::new();
        for (idx, entry) in self.for_platform(platform).enumerate() {
            let mut score = 0;
            if let Some((_, aliases)) = TECH_ALIASES.iter().find(|(t, _)| *t == entry.tech) {
                score += 2 * aliases
                    .iter()
                    .filter(|a| words.iter().any(|w| w.starts_with(*a)))
                    .count() as u32;
            }
            if words.iter().any(|w| *w == entry.tech) {
                score += 1;
            }
            if score > 0 {
                scored.push((score, idx, entry));
            }
        }

        if scored.is_empty() {
            return ["interfaces", "bgp"]
                .iter()
                .filter_map(|tech| self.starter(platform, tech))
                .take(limit)
                .collect();
        }

        // stable: higher score first, catalog order on ties
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, _, e)| e.command.clone())
            .collect()
    }
}

/// Unknown platforms get IOS-XR spellings.
fn platform_key(platform: Platform) -> &'static str {
    match platform {
        Platform::Unknown => Platform::IosXr.catalog_key(),
        p => p.catalog_key(),
    }
}

fn normalize_platform(p: &str) -> String {
    let p = p.trim().to_lowercase().replace(['_', '-'], "");
    match p.as_str() {
        "iosxe" | "ios" | "iosxenative" => "iosxe".to_string(),
        "iosxr" | "iosxrv" => "iosxr".to_string(),
        _ => p,
    }
}
