//! Mock ConfigMap store for testing
//!
//! Stores ConfigMaps in memory and hands out increasing resource versions,
//! useful for unit tests without requiring a Kubernetes cluster.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ConfigMapStore, StoredConfigMap};
use crate::error::{KubeError, Result};

type Key = (String, String);

/// In-memory ConfigMap store for testing
#[derive(Clone, Default)]
pub struct MockConfigMapStore {
    /// Storage: (namespace, name) -> ConfigMap
    store: Arc<RwLock<HashMap<Key, StoredConfigMap>>>,
    /// Last handed-out resource version
    version: Arc<RwLock<u64>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<OperationCounts>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub puts: usize,
    pub deletes: usize,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl MockConfigMapStore {
    /// Create a new empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a ConfigMap without any version check
    ///
    /// Stands in for writes that reach the cluster through other channels
    /// (server-side apply, Helm).
    pub fn upsert(&self, mut config_map: StoredConfigMap) -> StoredConfigMap {
        config_map.resource_version = Some(self.next_version());
        write(&self.store).insert(
            (config_map.namespace.clone(), config_map.name.clone()),
            config_map.clone(),
        );
        config_map
    }

    /// Peek at a ConfigMap without counting an operation
    pub fn peek(&self, namespace: &str, name: &str) -> Option<StoredConfigMap> {
        read(&self.store)
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Names of all stored ConfigMaps in a namespace, sorted
    pub fn names(&self, namespace: &str) -> Vec<String> {
        let mut names: Vec<_> = read(&self.store)
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        read(&self.operations).clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        *write(&self.operations) = OperationCounts::default();
    }

    fn next_version(&self) -> String {
        let mut version = write(&self.version);
        *version += 1;
        version.to_string()
    }
}

#[async_trait]
impl ConfigMapStore for MockConfigMapStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredConfigMap>> {
        write(&self.operations).gets += 1;
        Ok(self.peek(namespace, name))
    }

    async fn put(&self, config_map: &StoredConfigMap) -> Result<StoredConfigMap> {
        write(&self.operations).puts += 1;

        let key = (config_map.namespace.clone(), config_map.name.clone());
        let current = read(&self.store)
            .get(&key)
            .and_then(|cm| cm.resource_version.clone());

        if current != config_map.resource_version {
            return Err(KubeError::Conflict {
                namespace: config_map.namespace.clone(),
                name: config_map.name.clone(),
            });
        }

        Ok(self.upsert(config_map.clone()))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool> {
        write(&self.operations).deletes += 1;
        Ok(write(&self.store)
            .remove(&(namespace.to_string(), name.to_string()))
            .is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_conflict() {
        let store = MockConfigMapStore::new();
        let cm = StoredConfigMap::new("default", "a");

        let created = store.put(&cm).await.unwrap();
        assert!(created.resource_version.is_some());

        // Creating again without a token conflicts
        let err = store.put(&cm).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_stale_token_rejected() {
        let store = MockConfigMapStore::new();
        let first = store.put(&StoredConfigMap::new("default", "a")).await.unwrap();

        let mut update = first.clone();
        update.data.insert("x".to_string(), "yes".to_string());
        let second = store.put(&update).await.unwrap();
        assert_ne!(first.resource_version, second.resource_version);

        // Writing with the first token again must fail
        let err = store.put(&update).await.unwrap_err();
        assert!(matches!(err, KubeError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_delete_and_counts() {
        let store = MockConfigMapStore::new();
        store.upsert(StoredConfigMap::new("ns", "a"));

        assert!(store.delete("ns", "a").await.unwrap());
        assert!(!store.delete("ns", "a").await.unwrap());
        assert!(store.get("ns", "a").await.unwrap().is_none());

        let counts = store.operation_counts();
        assert_eq!(counts.deletes, 2);
        assert_eq!(counts.gets, 1);
        assert_eq!(counts.puts, 0);
    }
}
