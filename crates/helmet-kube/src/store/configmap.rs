//! Kubernetes ConfigMap store

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Client;
use kube::api::{Api, DeleteParams, PostParams};
use std::collections::BTreeMap;

use super::{ConfigMapStore, MANAGED_BY, MANAGED_BY_LABEL, StoredConfigMap};
use crate::error::{KubeError, Result};

/// ConfigMap store backed by the API server
#[derive(Clone)]
pub struct KubeConfigMapStore {
    client: Client,
}

impl KubeConfigMapStore {
    /// Create a store using the default kubeconfig / in-cluster config
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn build(config_map: &StoredConfigMap) -> ConfigMap {
        let mut labels = BTreeMap::new();
        labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());

        ConfigMap {
            metadata: ObjectMeta {
                name: Some(config_map.name.clone()),
                namespace: Some(config_map.namespace.clone()),
                resource_version: config_map.resource_version.clone(),
                labels: Some(labels),
                ..Default::default()
            },
            data: Some(config_map.data.clone()),
            ..Default::default()
        }
    }

    fn parse(namespace: &str, cm: ConfigMap) -> StoredConfigMap {
        StoredConfigMap {
            name: cm.metadata.name.unwrap_or_default(),
            namespace: cm
                .metadata
                .namespace
                .unwrap_or_else(|| namespace.to_string()),
            data: cm.data.unwrap_or_default(),
            resource_version: cm.metadata.resource_version,
        }
    }

    fn conflict(config_map: &StoredConfigMap) -> KubeError {
        KubeError::Conflict {
            namespace: config_map.namespace.clone(),
            name: config_map.name.clone(),
        }
    }
}

#[async_trait]
impl ConfigMapStore for KubeConfigMapStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<StoredConfigMap>> {
        let found = self.api(namespace).get_opt(name).await?;
        Ok(found.map(|cm| Self::parse(namespace, cm)))
    }

    async fn put(&self, config_map: &StoredConfigMap) -> Result<StoredConfigMap> {
        let api = self.api(&config_map.namespace);
        let object = Self::build(config_map);

        let result = match &config_map.resource_version {
            None => api.create(&PostParams::default(), &object).await,
            Some(_) => {
                api.replace(&config_map.name, &PostParams::default(), &object)
                    .await
            }
        };

        match result {
            Ok(cm) => Ok(Self::parse(&config_map.namespace, cm)),
            // 409: exists on create, stale resourceVersion on replace.
            // 404 on replace: deleted since it was read.
            Err(kube::Error::Api(e)) if e.code == 409 => Err(Self::conflict(config_map)),
            Err(kube::Error::Api(e)) if e.code == 404 && config_map.resource_version.is_some() => {
                Err(Self::conflict(config_map))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<bool> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
