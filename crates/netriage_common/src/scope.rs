//! Scope and device inventory types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The (config-set, task) pairing a session or capture belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    pub config_dir: String,
    pub task_dir: String,
}

impl Scope {
    pub fn new(config_dir: &str, task_dir: &str) -> Self {
        Self {
            config_dir: config_dir.to_string(),
            task_dir: task_dir.to_string(),
        }
    }

    /// Both parts must be a single, non-hidden path component.
    pub fn is_well_formed(&self) -> bool {
        is_safe_component(&self.config_dir) && is_safe_component(&self.task_dir)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.config_dir, self.task_dir)
    }
}

fn is_safe_component(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('.')
        && !s.contains('/')
        && !s.contains('\\')
        && !s.chars().any(|c| c.is_control())
}

/// Device software family. Drives command spelling in the trusted catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    IosXr,
    Ios,
    Unknown,
}

impl Platform {
    /// Map an inventory `device_type` (netmiko naming) to a platform.
    pub fn from_device_type(device_type: &str) -> Self {
        let t = device_type.trim().to_lowercase().replace('-', "_");
        match t.as_str() {
            "cisco_xr" | "cisco_iosxr" | "iosxr" => Platform::IosXr,
            "cisco_ios" | "cisco_ios_telnet" | "cisco_xe" | "iosxe" | "ios" => Platform::Ios,
            _ => Platform::Unknown,
        }
    }

    /// Catalog key used in the trusted-commands file.
    pub fn catalog_key(&self) -> &'static str {
        match self {
            Platform::IosXr => "iosxr",
            Platform::Ios => "iosxe",
            Platform::Unknown => "unknown",
        }
    }
}

/// One entry of a scope's `devices.yaml`.
///
/// No credentials here; session authentication belongs to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub device_type: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Device {
    pub fn platform(&self) -> Platform {
        Platform::from_device_type(&self.device_type)
    }

    /// Address used to reach the device; falls back to the inventory name.
    pub fn address(&self) -> &str {
        self.hostname.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_well_formed() {
        assert!(Scope::new("configs.5", "task-18.bfd").is_well_formed());
        assert!(!Scope::new("..", "task").is_well_formed());
        assert!(!Scope::new("configs.5", "a/b").is_well_formed());
        assert!(!Scope::new("", "task").is_well_formed());
    }

    #[test]
    fn test_platform_from_device_type() {
        assert_eq!(Platform::from_device_type("cisco_xr"), Platform::IosXr);
        assert_eq!(Platform::from_device_type("cisco_ios"), Platform::Ios);
        assert_eq!(Platform::from_device_type("juniper_junos"), Platform::Unknown);
    }

    #[test]
    fn test_device_address_fallback() {
        let dev = Device {
            name: "C-ASBR-1".into(),
            device_type: "cisco_xr".into(),
            hostname: None,
            username: None,
            port: None,
        };
        assert_eq!(dev.address(), "C-ASBR-1");
    }
}
