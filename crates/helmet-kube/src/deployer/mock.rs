//! Mock deployer for testing
//!
//! Records every mutation instead of touching a cluster. Marker ConfigMaps
//! found in applied documents or in an installed chart's marker template are
//! copied into a [`MockConfigMapStore`], standing in for what the API server
//! and Helm would have persisted.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Deployer, HelmRequest, parse_documents};
use crate::error::{KubeError, Result};
use crate::marker::{DIGEST_KEY, MARKER_TEMPLATE_FILE, parse_marker_document};
use crate::store::{MockConfigMapStore, StoredConfigMap};

/// A recorded mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployCall {
    Apply { namespace: String, names: Vec<String> },
    Install { release: String, namespace: String },
    Upgrade { release: String, namespace: String },
    Uninstall { release: String, namespace: String },
}

impl DeployCall {
    /// Release name of a Helm call
    pub fn release(&self) -> Option<&str> {
        match self {
            Self::Apply { .. } => None,
            Self::Install { release, .. }
            | Self::Upgrade { release, .. }
            | Self::Uninstall { release, .. } => Some(release),
        }
    }
}

/// In-memory deployer for testing
#[derive(Clone, Default)]
pub struct MockDeployer {
    store: MockConfigMapStore,
    calls: Arc<Mutex<Vec<DeployCall>>>,
    /// (namespace, release name) of installed releases
    releases: Arc<Mutex<BTreeSet<(String, String)>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    fail_apply: Arc<Mutex<bool>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockDeployer {
    /// Create a deployer persisting markers into `store`
    pub fn new(store: MockConfigMapStore) -> Self {
        Self {
            store,
            ..Default::default()
        }
    }

    /// Make every Helm call for `release` fail
    pub fn fail_on(&self, release: impl Into<String>) {
        lock(&self.failing).insert(release.into());
    }

    /// Make server-side apply fail
    pub fn fail_apply(&self, fail: bool) {
        *lock(&self.fail_apply) = fail;
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        lock(&self.failing).clear();
        *lock(&self.fail_apply) = false;
    }

    /// Pretend a release already exists
    pub fn add_release(&self, release: &str, namespace: &str) {
        lock(&self.releases).insert((namespace.to_string(), release.to_string()));
    }

    /// Recorded mutations, in order
    pub fn calls(&self) -> Vec<DeployCall> {
        lock(&self.calls).clone()
    }

    /// Number of recorded mutations
    pub fn mutation_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Forget recorded mutations
    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: DeployCall) {
        lock(&self.calls).push(call);
    }

    fn check_failure(&self, release: &str) -> Result<()> {
        if lock(&self.failing).contains(release) {
            return Err(KubeError::DeploymentFailed {
                release: release.to_string(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn persist_markers(&self, documents: &[serde_yaml::Value]) {
        for document in documents {
            if let Some((namespace, name, digest)) = parse_marker_document(document) {
                let mut cm = StoredConfigMap::new(namespace, name);
                cm.data.insert(DIGEST_KEY.to_string(), digest);
                self.store.upsert(cm);
            }
        }
    }

    /// Marker documents shipped in the chart's templates folder
    fn chart_markers(chart_path: &Path) -> Result<Vec<serde_yaml::Value>> {
        let marker = chart_path.join("templates").join(MARKER_TEMPLATE_FILE);
        if !marker.is_file() {
            return Ok(Vec::new());
        }
        parse_documents(&std::fs::read_to_string(&marker)?)
    }

    fn deploy(&self, request: &HelmRequest) -> Result<()> {
        self.check_failure(&request.release_name)?;
        self.persist_markers(&Self::chart_markers(&request.chart_path)?);
        lock(&self.releases).insert((request.namespace.clone(), request.release_name.clone()));
        Ok(())
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn apply_documents(&self, namespace: &str, documents: &[serde_yaml::Value]) -> Result<()> {
        let names: Vec<String> = documents
            .iter()
            .filter_map(|d| d.get("metadata")?.get("name")?.as_str().map(String::from))
            .collect();
        self.record(DeployCall::Apply {
            namespace: namespace.to_string(),
            names: names.clone(),
        });

        if *lock(&self.fail_apply) {
            return Err(KubeError::DeploymentFailed {
                release: names.join(", "),
                message: "injected apply failure".to_string(),
            });
        }

        self.persist_markers(documents);
        Ok(())
    }

    async fn release_exists(&self, release_name: &str, namespace: &str) -> Result<bool> {
        Ok(lock(&self.releases).contains(&(namespace.to_string(), release_name.to_string())))
    }

    async fn install(&self, request: &HelmRequest) -> Result<()> {
        self.record(DeployCall::Install {
            release: request.release_name.clone(),
            namespace: request.namespace.clone(),
        });
        self.deploy(request)
    }

    async fn upgrade(&self, request: &HelmRequest) -> Result<()> {
        self.record(DeployCall::Upgrade {
            release: request.release_name.clone(),
            namespace: request.namespace.clone(),
        });
        self.deploy(request)
    }

    async fn uninstall(&self, release_name: &str, namespace: &str) -> Result<()> {
        self.record(DeployCall::Uninstall {
            release: release_name.to_string(),
            namespace: namespace.to_string(),
        });
        self.check_failure(release_name)?;
        lock(&self.releases).remove(&(namespace.to_string(), release_name.to_string()));
        Ok(())
    }
}
