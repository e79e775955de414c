//! Remote chart sources
//!
//! A chart is fetched from exactly one of three kinds of origin. Helm
//! repositories are resolved against a version range; OCI images and remote
//! archives are pinned to an exact version.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a chart comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum RemoteChartSource {
    HelmRepo(HelmRepoSource),
    OciRegistry(OciRegistrySource),
    RemoteArchive(RemoteArchiveSource),
}

/// A chart published in a Helm repository index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepoSource {
    /// Chart name inside the repository index
    pub remote_name: String,

    /// Repository base URL, or the URL of its `index.yaml`
    pub remote_repo_url: String,

    /// Only consider index entries with this chart API version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Version range to satisfy
    #[serde(rename = "version", alias = "versionConstraint")]
    pub version_constraint: String,
}

/// A chart pushed to an OCI registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OciRegistrySource {
    /// Image reference without tag, e.g. `oci://ghcr.io/org/charts/app`
    pub oci_ref: String,

    /// Exact tag to pull
    pub version: String,
}

/// A chart living inside a downloadable archive (e.g. a GitHub tarball)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteArchiveSource {
    /// URL of a `.zip`, `.tgz` or `.tar.gz` archive
    pub archive_url: String,

    /// Path of the chart below the archive's top-level directory
    pub extract_path: String,

    /// Version the chart is expected to carry
    pub version: String,
}

impl RemoteChartSource {
    /// Short name of the source kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HelmRepo(_) => "helmRepo",
            Self::OciRegistry(_) => "ociRegistry",
            Self::RemoteArchive(_) => "remoteArchive",
        }
    }

    /// The requested version: a range for Helm repositories, a pin otherwise
    pub fn requested_version(&self) -> &str {
        match self {
            Self::HelmRepo(s) => &s.version_constraint,
            Self::OciRegistry(s) => &s.version,
            Self::RemoteArchive(s) => &s.version,
        }
    }

    /// Whether the requested version is an exact pin
    pub fn is_pinned(&self) -> bool {
        !matches!(self, Self::HelmRepo(_))
    }
}

impl fmt::Display for RemoteChartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HelmRepo(s) => write!(
                f,
                "{}@{} from {}",
                s.remote_name, s.version_constraint, s.remote_repo_url
            ),
            Self::OciRegistry(s) => write!(f, "{}:{}", s.oci_ref, s.version),
            Self::RemoteArchive(s) => {
                write!(f, "{}!/{}@{}", s.archive_url, s.extract_path, s.version)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_helm_repo() {
        let yaml = r#"
source: helmRepo
remoteName: cert-manager
remoteRepoUrl: https://charts.jetstack.io
version: ^1.14.0
"#;
        let source: RemoteChartSource = serde_yaml::from_str(yaml).unwrap();
        match &source {
            RemoteChartSource::HelmRepo(s) => {
                assert_eq!(s.remote_name, "cert-manager");
                assert_eq!(s.version_constraint, "^1.14.0");
                assert!(s.api_version.is_none());
            }
            other => panic!("unexpected source {:?}", other),
        }
        assert!(!source.is_pinned());
        assert_eq!(source.kind(), "helmRepo");
    }

    #[test]
    fn test_parse_version_constraint_alias() {
        let yaml = r#"
source: helmRepo
remoteName: x
remoteRepoUrl: https://example.com
versionConstraint: ">=1.0.0 <2.0.0"
apiVersion: v2
"#;
        let source: RemoteChartSource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.requested_version(), ">=1.0.0 <2.0.0");
    }

    #[test]
    fn test_parse_pinned_sources() {
        let yaml = r#"
source: ociRegistry
ociRef: oci://ghcr.io/org/charts/app
version: 0.3.1
"#;
        let source: RemoteChartSource = serde_yaml::from_str(yaml).unwrap();
        assert!(source.is_pinned());
        assert_eq!(source.to_string(), "oci://ghcr.io/org/charts/app:0.3.1");

        let yaml = r#"
source: remoteArchive
archiveUrl: https://github.com/org/repo/archive/refs/tags/v1.2.0.tar.gz
extractPath: deploy/chart
version: 1.2.0
"#;
        let source: RemoteChartSource = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.kind(), "remoteArchive");
        assert_eq!(source.requested_version(), "1.2.0");
    }

    #[test]
    fn test_unknown_source_kind() {
        let yaml = "source: git\nurl: x\n";
        assert!(serde_yaml::from_str::<RemoteChartSource>(yaml).is_err());
    }
}
