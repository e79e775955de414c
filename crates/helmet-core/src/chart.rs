//! Local chart descriptor (`Chart.yaml`)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CoreError, Result};

/// File name of the chart descriptor
pub const CHART_FILE: &str = "Chart.yaml";

/// Metadata read from a fetched chart's `Chart.yaml`
///
/// Only the fields Helmet relies on are typed; everything else in the file is
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// Chart API version (v1 or v2)
    #[serde(default)]
    pub api_version: Option<String>,

    /// Chart name
    pub name: String,

    /// Chart version
    pub version: String,

    /// Version of the packaged application, not necessarily semver
    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Chart type (application or library)
    #[serde(default, rename = "type")]
    pub chart_type: Option<String>,

    /// Compatible Kubernetes versions (semver range)
    #[serde(default)]
    pub kube_version: Option<String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartMetadata {
    /// Parse a descriptor from YAML
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load the descriptor of the chart rooted at `chart_dir`
    pub fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(CHART_FILE);
        let content = std::fs::read_to_string(&path)?;

        let meta = Self::from_yaml(&content).map_err(|e| CoreError::InvalidChart {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        if meta.name.trim().is_empty() {
            return Err(CoreError::InvalidChart {
                path: path.display().to_string(),
                message: "name must not be empty".to_string(),
            });
        }

        Ok(meta)
    }

    /// Load the descriptor if the chart directory exists
    ///
    /// A missing directory, or one without a `Chart.yaml`, yields `None`.
    /// A descriptor that exists but does not parse is an error.
    pub fn load_existing(chart_dir: &Path) -> Result<Option<Self>> {
        if !chart_dir.join(CHART_FILE).is_file() {
            return Ok(None);
        }
        Self::load(chart_dir).map(Some)
    }
}
