//! Scope resolution and device inventory.
//!
//! A scope `{config_dir, task_dir}` resolves to `<repo_root>/<config_dir>/<task_dir>`.
//! The inventory lives one level up, in `<repo_root>/<config_dir>/devices.yaml`:
//!
//! ```yaml
//! devices:
//!   - name: C-ASBR-1
//!     device_type: cisco_xr
//!     hostname: 192.168.100.112
//!     username: lab
//! ```

use crate::config::ScopesConfig;
use netriage_common::{Device, Scope, TriageError, TriageResult};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    devices: Vec<Device>,
}

/// Devices of one config set.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub devices: Vec<Device>,
}

impl Inventory {
    /// Lookup by inventory name, ignoring case.
    pub fn find(&self, host: &str) -> Option<&Device> {
        let host = host.trim();
        self.devices
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(host))
    }
}

#[derive(Debug, Clone)]
pub struct ScopeCatalog {
    repo_root: PathBuf,
    artifact_subdir: String,
    inventory_file: String,
}

impl ScopeCatalog {
    pub fn new(config: &ScopesConfig) -> Self {
        Self {
            repo_root: config.repo_root.clone(),
            artifact_subdir: config.artifact_subdir.clone(),
            inventory_file: config.inventory_file.clone(),
        }
    }

    pub fn scope_dir(&self, scope: &Scope) -> PathBuf {
        self.repo_root.join(&scope.config_dir).join(&scope.task_dir)
    }

    /// Where captures, show logs and trial history for a scope are written.
    pub fn artifact_dir(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope).join(&self.artifact_subdir)
    }

    /// Check the scope exists and load its inventory.
    pub fn resolve(&self, scope: &Scope) -> TriageResult<Inventory> {
        if !scope.is_well_formed() {
            return Err(TriageError::InvalidScope(format!(
                "{} contains an unsafe path component",
                scope
            )));
        }

        let dir = self.scope_dir(scope);
        if !dir.is_dir() {
            return Err(TriageError::InvalidScope(format!("{} does not exist", scope)));
        }

        let path = self
            .repo_root
            .join(&scope.config_dir)
            .join(&self.inventory_file);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TriageError::InvalidScope(format!("{}: inventory {} unreadable: {}", scope, path.display(), e))
        })?;
        let parsed: InventoryFile = serde_yaml::from_str(&content).map_err(|e| {
            TriageError::InvalidScope(format!("{}: inventory {} malformed: {}", scope, path.display(), e))
        })?;

        debug!("Resolved scope {} with {} devices", scope, parsed.devices.len());
        Ok(Inventory {
            devices: parsed.devices,
        })
    }

    /// Resolve scope and host together.
    pub fn device(&self, scope: &Scope, host: &str) -> TriageResult<Device> {
        let inventory = self.resolve(scope)?;
        inventory
            .find(host)
            .cloned()
            .ok_or_else(|| TriageError::InvalidHost(format!("{} is not in the {} inventory", host, scope)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const DEVICES_YAML: &str = r#"
devices:
  - name: B-ASBR-1
    device_type: cisco_ios
    hostname: 192.168.100.111
    username: lab
    password: not-modelled
  - name: C-ASBR-1
    device_type: cisco_xr
    hostname: 192.168.100.112
"#;

    fn catalog_with_tree() -> (TempDir, ScopeCatalog) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("configs.5/task-18.bfd")).unwrap();
        fs::write(dir.path().join("configs.5/devices.yaml"), DEVICES_YAML).unwrap();
        let config = ScopesConfig {
            repo_root: dir.path().to_path_buf(),
            ..ScopesConfig::default()
        };
        (dir, ScopeCatalog::new(&config))
    }

    #[test]
    fn test_resolve_loads_inventory() {
        let (_dir, catalog) = catalog_with_tree();
        let inv = catalog.resolve(&Scope::new("configs.5", "task-18.bfd")).unwrap();
        assert_eq!(inv.devices.len(), 2);
        assert_eq!(inv.find("c-asbr-1").map(|d| d.name.as_str()), Some("C-ASBR-1"));
    }

    #[test]
    fn test_missing_task_dir_is_invalid_scope() {
        let (_dir, catalog) = catalog_with_tree();
        let err = catalog.resolve(&Scope::new("configs.5", "task-99")).unwrap_err();
        assert!(matches!(err, TriageError::InvalidScope(_)));
    }

    #[test]
    fn test_traversal_is_invalid_scope() {
        let (_dir, catalog) = catalog_with_tree();
        let err = catalog.resolve(&Scope::new("..", "etc")).unwrap_err();
        assert!(matches!(err, TriageError::InvalidScope(_)));
    }

    #[test]
    fn test_unknown_host_is_invalid_host() {
        let (_dir, catalog) = catalog_with_tree();
        let err = catalog
            .device(&Scope::new("configs.5", "task-18.bfd"), "Z-PE-9")
            .unwrap_err();
        assert!(matches!(err, TriageError::InvalidHost(_)));
    }

    #[test]
    fn test_artifact_dir_layout() {
        let (dir, catalog) = catalog_with_tree();
        assert_eq!(
            catalog.artifact_dir(&Scope::new("configs.5", "task-18.bfd")),
            dir.path().join("configs.5/task-18.bfd/netriage")
        );
    }
}
