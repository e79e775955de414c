//! Cluster mutations
//!
//! Every write the executor makes to the cluster goes through the
//! [`Deployer`] trait:
//! - **Helm**: `HelmDeployer` runs the `helm` binary and applies CRDs with
//!   server-side apply
//! - **Mock**: `MockDeployer` records calls for tests

mod helm;
mod mock;

pub use helm::HelmDeployer;
pub use mock::{DeployCall, MockDeployer};

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Options passed through to Helm
#[derive(Debug, Clone)]
pub struct HelmOptions {
    pub wait: bool,
    pub atomic: bool,
    pub cleanup_on_fail: bool,
    pub force: bool,
    pub create_namespace: bool,

    /// Helm duration string, e.g. `5m0s`
    pub timeout: Option<String>,

    /// Pass `--debug` to Helm
    pub debug: bool,

    /// Revisions kept by `helm upgrade`
    pub history_max: u32,
}

impl Default for HelmOptions {
    fn default() -> Self {
        Self {
            wait: false,
            atomic: false,
            cleanup_on_fail: false,
            force: false,
            create_namespace: false,
            timeout: None,
            debug: false,
            history_max: 2,
        }
    }
}

/// One Helm install or upgrade
#[derive(Debug, Clone)]
pub struct HelmRequest {
    pub release_name: String,
    pub namespace: String,
    pub chart_path: PathBuf,
    pub options: HelmOptions,
}

/// Cluster mutation backend
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Server-side apply documents, forcing field ownership
    ///
    /// Namespaced documents without a namespace land in `namespace`.
    async fn apply_documents(&self, namespace: &str, documents: &[serde_yaml::Value]) -> Result<()>;

    /// Whether a Helm release exists, in any state
    async fn release_exists(&self, release_name: &str, namespace: &str) -> Result<bool>;

    async fn install(&self, request: &HelmRequest) -> Result<()>;

    async fn upgrade(&self, request: &HelmRequest) -> Result<()>;

    async fn uninstall(&self, release_name: &str, namespace: &str) -> Result<()>;
}

/// `helm install` arguments
pub fn install_args(request: &HelmRequest) -> Vec<String> {
    let options = &request.options;
    let mut args = vec![
        "install".to_string(),
        "-n".to_string(),
        request.namespace.clone(),
    ];

    if options.wait {
        args.push("--wait".to_string());
    }
    if options.atomic {
        args.push("--atomic".to_string());
    }
    if let Some(timeout) = &options.timeout {
        args.push(format!("--timeout={}", timeout));
    }
    if options.create_namespace {
        args.push("--create-namespace".to_string());
    }
    if options.debug {
        args.push("--debug".to_string());
    }

    args.push(request.release_name.clone());
    args.push(request.chart_path.display().to_string());
    args
}

/// `helm upgrade` arguments
pub fn upgrade_args(request: &HelmRequest) -> Vec<String> {
    let options = &request.options;
    let mut args = vec![
        "upgrade".to_string(),
        "-n".to_string(),
        request.namespace.clone(),
        format!("--history-max={}", options.history_max),
    ];

    if options.wait {
        args.push("--wait".to_string());
    }
    if options.cleanup_on_fail {
        args.push("--cleanup-on-fail".to_string());
    }
    if options.atomic {
        args.push("--atomic".to_string());
    }
    if let Some(timeout) = &options.timeout {
        args.push(format!("--timeout={}", timeout));
    }
    if options.force {
        args.push("--force".to_string());
    }
    if options.create_namespace {
        args.push("--create-namespace".to_string());
    }
    if options.debug {
        args.push("--debug".to_string());
    }

    args.push(request.release_name.clone());
    args.push(request.chart_path.display().to_string());
    args
}

/// `helm ls` arguments listing every release of a namespace as JSON
pub fn list_args(namespace: &str) -> Vec<String> {
    ["ls", "-a", "-n", namespace, "-o", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `helm uninstall` arguments
pub fn uninstall_args(release_name: &str, namespace: &str) -> Vec<String> {
    ["uninstall", "-n", namespace, release_name]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Read every YAML document of a file, skipping empty ones
pub fn read_documents(path: &Path) -> Result<Vec<serde_yaml::Value>> {
    let content = std::fs::read_to_string(path)?;
    parse_documents(&content)
}

/// Parse a multi-document YAML string, skipping empty documents
pub fn parse_documents(content: &str) -> Result<Vec<serde_yaml::Value>> {
    use serde::Deserialize;

    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = serde_yaml::Value::deserialize(document)?;
        if !value.is_null() {
            documents.push(value);
        }
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: HelmOptions) -> HelmRequest {
        HelmRequest {
            release_name: "foo-resources".to_string(),
            namespace: "ns".to_string(),
            chart_path: PathBuf::from("/bundles/foo/resources"),
            options,
        }
    }

    #[test]
    fn test_install_args_minimal() {
        let args = install_args(&request(HelmOptions::default()));
        insta::assert_snapshot!(args.join(" "), @"install -n ns foo-resources /bundles/foo/resources");
    }

    #[test]
    fn test_install_args_all_flags() {
        let options = HelmOptions {
            wait: true,
            atomic: true,
            cleanup_on_fail: true,
            force: true,
            create_namespace: true,
            timeout: Some("10m".to_string()),
            debug: true,
            history_max: 5,
        };
        // cleanup-on-fail, force and history-max only apply to upgrades
        let args = install_args(&request(options));
        insta::assert_snapshot!(
            args.join(" "),
            @"install -n ns --wait --atomic --timeout=10m --create-namespace --debug foo-resources /bundles/foo/resources"
        );
    }

    #[test]
    fn test_upgrade_args() {
        let args = upgrade_args(&request(HelmOptions::default()));
        insta::assert_snapshot!(
            args.join(" "),
            @"upgrade -n ns --history-max=2 foo-resources /bundles/foo/resources"
        );

        let options = HelmOptions {
            wait: true,
            atomic: true,
            cleanup_on_fail: true,
            force: true,
            timeout: Some("5m0s".to_string()),
            ..Default::default()
        };
        let args = upgrade_args(&request(options));
        insta::assert_snapshot!(
            args.join(" "),
            @"upgrade -n ns --history-max=2 --wait --cleanup-on-fail --atomic --timeout=5m0s --force foo-resources /bundles/foo/resources"
        );
    }

    #[test]
    fn test_list_args() {
        assert_eq!(list_args("ns").join(" "), "ls -a -n ns -o json");
    }

    #[test]
    fn test_parse_documents_skips_empty() {
        let docs = parse_documents("---\nkind: A\n---\n# comment only\n---\nkind: B\n").unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["kind"].as_str(), Some("B"));
    }
}
