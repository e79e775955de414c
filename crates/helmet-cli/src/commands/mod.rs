//! CLI commands

pub mod digest;
pub mod install;
pub mod uninstall;
pub mod update;
pub mod whitelist;

use helmet_core::{CompiledBundle, HelmetConfig};
use helmet_kube::{ConfigMapStore, HelmDeployer, KubeConfigMapStore, WhitelistGate};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Settings shared by the cluster commands
pub struct Context {
    pub config: HelmetConfig,
}

impl Context {
    /// Load the config file and apply command-line overrides
    pub fn load(config_path: Option<&Path>, whitelist_namespace: Option<String>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => HelmetConfig::load_from(path)?,
            None => HelmetConfig::load()?,
        };

        if let Some(namespace) = whitelist_namespace {
            config.whitelist_namespace = namespace;
        }

        Ok(Self { config })
    }

    /// Connect to the cluster of the current kubeconfig context
    pub async fn connect(&self) -> Result<Cluster> {
        let client = kube::Client::try_default().await?;
        let store: Arc<dyn ConfigMapStore> =
            Arc::new(KubeConfigMapStore::with_client(client.clone()));

        Ok(Cluster {
            gate: WhitelistGate::new(
                store.clone(),
                &self.config.whitelist_namespace,
                self.config.whitelist_retries,
            ),
            deployer: Arc::new(HelmDeployer::new(
                client,
                &self.config.helm_binary,
                &self.config.field_manager,
            )),
            store,
        })
    }
}

/// Cluster-side collaborators of a command
pub struct Cluster {
    pub store: Arc<dyn ConfigMapStore>,
    pub gate: WhitelistGate,
    pub deployer: Arc<HelmDeployer>,
}

/// Read a bundle's release id
pub fn release_id(bundle: &Path) -> Result<String> {
    Ok(CompiledBundle::load(bundle)?.release_id().to_string())
}
