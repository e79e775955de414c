//! ConfigMap persistence
//!
//! Whitelist and digest markers are plain ConfigMaps. Writes are guarded by
//! the object's `resourceVersion`, which serves as the optimistic-concurrency
//! token:
//! - **Cluster**: `KubeConfigMapStore` talks to the API server
//! - **Mock**: `MockConfigMapStore` keeps everything in memory for tests

mod configmap;
mod mock;

pub use configmap::KubeConfigMapStore;
pub use mock::{MockConfigMapStore, OperationCounts};

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;

/// Label put on every ConfigMap Helmet writes
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY: &str = "helmet";

/// A ConfigMap as seen by Helmet
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoredConfigMap {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,

    /// Concurrency token; `None` for an object that does not exist yet
    pub resource_version: Option<String>,
}

impl StoredConfigMap {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }
}

/// ConfigMap store trait
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ConfigMapStore: Send + Sync {
    /// Read a ConfigMap; absence is `Ok(None)`
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredConfigMap>>;

    /// Write a ConfigMap guarded by its `resource_version`
    ///
    /// Without a version the object is created and the write fails with
    /// `KubeError::Conflict` if it already exists. With a version the object is
    /// replaced only if its current version still matches.
    async fn put(&self, config_map: &StoredConfigMap) -> Result<StoredConfigMap>;

    /// Delete a ConfigMap; returns whether it existed
    async fn delete(&self, namespace: &str, name: &str) -> Result<bool>;
}
