//! Provisioner configuration
//!
//! Loaded from an optional YAML file (path in `ASYNC_STORAGE_CONFIG`) with
//! individual fields overridable through environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

pub const CONFIG_PATH_ENV: &str = "ASYNC_STORAGE_CONFIG";
pub const STORAGE_IMAGE_ENV: &str = "ASYNC_STORAGE_IMAGE";
pub const PVC_QUANTITY_ENV: &str = "ASYNC_STORAGE_PVC_QUANTITY";
pub const PVC_ACCESS_MODE_ENV: &str = "ASYNC_STORAGE_PVC_ACCESS_MODE";
pub const PVC_STRATEGY_ENV: &str = "ASYNC_STORAGE_PVC_STRATEGY";
pub const EXISTENCE_CHECK_ENV: &str = "ASYNC_STORAGE_EXISTENCE_CHECK";
pub const SSH_KEYS_NAMESPACE_ENV: &str = "ASYNC_STORAGE_SSH_KEYS_NAMESPACE";

/// How the reconciler decides whether a resource already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExistenceCheck {
    /// List the namespace and look for the name before creating
    #[default]
    List,
    /// Create unconditionally; a name conflict means the resource exists
    Create,
}

impl std::str::FromStr for ExistenceCheck {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "list" => Ok(ExistenceCheck::List),
            "create" => Ok(ExistenceCheck::Create),
            other => Err(Error::config(format!(
                "Invalid existence check '{}': must be one of: list, create",
                other
            ))),
        }
    }
}

/// Provisioner settings
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionerConfig {
    /// Image of the rsync-over-SSH storage container
    #[serde(default = "default_storage_image")]
    pub storage_image: String,

    /// Capacity requested for the backup claim
    #[serde(default = "default_pvc_quantity")]
    pub pvc_quantity: String,

    /// Access mode of the backup claim
    #[serde(default = "default_pvc_access_mode")]
    pub pvc_access_mode: String,

    /// PVC strategy the workspaces run with
    #[serde(default = "default_pvc_strategy")]
    pub pvc_strategy: String,

    #[serde(default)]
    pub existence_check: ExistenceCheck,

    /// Namespace holding SSH key secrets
    #[serde(default = "default_ssh_keys_namespace")]
    pub ssh_keys_namespace: String,
}

fn default_storage_image() -> String {
    "quay.io/eclipse/che-workspace-data-sync-storage:0.0.1".to_string()
}

fn default_pvc_quantity() -> String {
    "10Gi".to_string()
}

fn default_pvc_access_mode() -> String {
    "ReadWriteOnce".to_string()
}

fn default_pvc_strategy() -> String {
    "common".to_string()
}

fn default_ssh_keys_namespace() -> String {
    "che".to_string()
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            storage_image: default_storage_image(),
            pvc_quantity: default_pvc_quantity(),
            pvc_access_mode: default_pvc_access_mode(),
            pvc_strategy: default_pvc_strategy(),
            existence_check: ExistenceCheck::default(),
            ssh_keys_namespace: default_ssh_keys_namespace(),
        }
    }
}

impl ProvisionerConfig {
    /// Parse a YAML document; absent fields take their defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from the file named by `ASYNC_STORAGE_CONFIG`, then apply
    /// environment overrides and validate
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                info!(path = %path, "Loading provisioner configuration");
                Self::from_file(Path::new(&path))?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from a key lookup (the process environment in `load`)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(STORAGE_IMAGE_ENV) {
            self.storage_image = v;
        }
        if let Some(v) = lookup(PVC_QUANTITY_ENV) {
            self.pvc_quantity = v;
        }
        if let Some(v) = lookup(PVC_ACCESS_MODE_ENV) {
            self.pvc_access_mode = v;
        }
        if let Some(v) = lookup(PVC_STRATEGY_ENV) {
            self.pvc_strategy = v;
        }
        if let Some(v) = lookup(EXISTENCE_CHECK_ENV) {
            self.existence_check = v.parse()?;
        }
        if let Some(v) = lookup(SSH_KEYS_NAMESPACE_ENV) {
            self.ssh_keys_namespace = v;
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// The strategy is left alone: it is only compared against `common` when
    /// a workspace asks for async storage.
    pub fn validate(&self) -> Result<()> {
        if self.storage_image.trim().is_empty() {
            return Err(Error::config("Storage image must not be empty"));
        }
        if self.pvc_quantity.trim().is_empty() {
            return Err(Error::config("PVC quantity must not be empty"));
        }
        if self.pvc_access_mode.trim().is_empty() {
            return Err(Error::config("PVC access mode must not be empty"));
        }
        if self.ssh_keys_namespace.trim().is_empty() {
            return Err(Error::config("SSH keys namespace must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ProvisionerConfig::from_yaml("{}").unwrap();
        assert_eq!(config, ProvisionerConfig::default());
        assert_eq!(config.pvc_strategy, "common");
        assert_eq!(config.existence_check, ExistenceCheck::List);
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "storageImage: registry.local/storage:1\npvcQuantity: 1Gi\npvcStrategy: per-workspace\nexistenceCheck: create"
        )
        .unwrap();

        let config = ProvisionerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage_image, "registry.local/storage:1");
        assert_eq!(config.pvc_quantity, "1Gi");
        assert_eq!(config.pvc_access_mode, "ReadWriteOnce");
        assert_eq!(config.pvc_strategy, "per-workspace");
        assert_eq!(config.existence_check, ExistenceCheck::Create);
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (PVC_ACCESS_MODE_ENV, "ReadWriteMany"),
            (EXISTENCE_CHECK_ENV, "create"),
        ]);
        let mut config = ProvisionerConfig::default();
        config
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.pvc_access_mode, "ReadWriteMany");
        assert_eq!(config.existence_check, ExistenceCheck::Create);
    }

    #[test]
    fn unknown_existence_check_is_rejected() {
        let mut config = ProvisionerConfig::default();
        let result = config.apply_overrides(|k| {
            (k == EXISTENCE_CHECK_ENV).then(|| "get".to_string())
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn empty_image_fails_validation() {
        let config = ProvisionerConfig {
            storage_image: " ".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Storage image"));
    }
}
