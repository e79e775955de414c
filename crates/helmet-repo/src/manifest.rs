//! Chart manifest: the list of charts `helmet update` keeps in sync
//!
//! ```yaml
//! cert-manager:
//!   source: helmRepo
//!   remoteName: cert-manager
//!   remoteRepoUrl: https://charts.jetstack.io
//!   version: ^1.14.0
//!   hooks:
//!     updated: ./scripts/patch-cert-manager.sh
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{RepoError, Result};
use crate::source::RemoteChartSource;

/// One chart in the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    #[serde(flatten)]
    pub source: RemoteChartSource,

    /// Shell commands run around the update
    #[serde(default)]
    pub hooks: HookCommands,
}

/// Shell commands attached to a chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookCommands {
    /// Run against the staged chart, before it replaces the local copy
    #[serde(default)]
    pub downloaded: Option<String>,

    /// Run after the local copy has been replaced
    #[serde(default)]
    pub updated: Option<String>,
}

/// Charts keyed by local name, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartManifest {
    pub charts: IndexMap<String, ChartEntry>,
}

impl ChartManifest {
    /// Parse a manifest from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml).map_err(|e| RepoError::InvalidManifest {
            message: e.to_string(),
        })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RepoError::InvalidManifest {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_yaml(&content)
    }

    /// Charts whose name contains `only`, or all of them
    pub fn select(&self, only: Option<&str>) -> Vec<(&str, &ChartEntry)> {
        self.charts
            .iter()
            .filter(|(name, _)| only.is_none_or(|filter| name.contains(filter)))
            .map(|(name, entry)| (name.as_str(), entry))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        for name in self.charts.keys() {
            let valid = !name.is_empty()
                && name != "."
                && name != ".."
                && !name.contains('/')
                && !name.contains('\\');
            if !valid {
                return Err(RepoError::InvalidManifest {
                    message: format!("'{}' is not a valid chart directory name", name),
                });
            }
        }
        Ok(())
    }
}
