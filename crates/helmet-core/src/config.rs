//! Helmet configuration
//!
//! Stored in `~/.config/helmet/config.yaml`. Every key is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Tool-wide settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelmetConfig {
    /// Namespace holding the whitelist ConfigMap
    pub whitelist_namespace: String,

    /// Release history kept by `helm upgrade`
    pub history_max: u32,

    /// Helm executable
    pub helm_binary: String,

    /// Field manager used for server-side apply
    pub field_manager: String,

    /// Attempts for a whitelist read-modify-write cycle
    pub whitelist_retries: u32,
}

impl Default for HelmetConfig {
    fn default() -> Self {
        Self {
            whitelist_namespace: "default".to_string(),
            history_max: 2,
            helm_binary: "helm".to_string(),
            field_manager: "helmet".to_string(),
            whitelist_retries: 5,
        }
    }
}

impl HelmetConfig {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| CoreError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("helmet").join("config.yaml"))
    }

    fn validate(&self) -> Result<()> {
        if self.whitelist_retries == 0 {
            return Err(CoreError::InvalidConfig {
                message: "whitelistRetries must be at least 1".to_string(),
            });
        }
        if self.helm_binary.trim().is_empty() {
            return Err(CoreError::InvalidConfig {
                message: "helmBinary must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HelmetConfig::default();
        assert_eq!(config.whitelist_namespace, "default");
        assert_eq!(config.history_max, 2);
        assert_eq!(config.whitelist_retries, 5);
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "whitelistNamespace: helmet-system\nhistoryMax: 5\n").unwrap();

        let config = HelmetConfig::load_from(&path).unwrap();
        assert_eq!(config.whitelist_namespace, "helmet-system");
        assert_eq!(config.history_max, 5);
        assert_eq!(config.helm_binary, "helm");
        assert_eq!(config.field_manager, "helmet");
    }

    #[test]
    fn test_rejects_zero_retries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "whitelistRetries: 0\n").unwrap();

        let err = HelmetConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig { .. }));
    }
}
