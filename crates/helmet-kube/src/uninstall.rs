//! Bundle uninstall

use helmet_core::{CompiledBundle, SubReleaseKind};
use std::path::Path;
use tracing::info;

use crate::deployer::Deployer;
use crate::error::{KubeError, Result};
use crate::marker::delete_marker;
use crate::store::ConfigMapStore;
use crate::whitelist::WhitelistGate;

/// What an uninstall removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UninstallReport {
    /// Helm releases uninstalled, in order
    pub releases: Vec<String>,
    /// Number of digest markers deleted
    pub markers: usize,
}

/// Uninstall a bundle's Helm releases and forget its digests
///
/// The resources release goes first, then the namespaces release. CRDs are
/// left in place since removing them would delete every custom resource of
/// their kinds.
pub async fn uninstall_bundle(
    bundle_dir: &Path,
    gate: &WhitelistGate,
    deployer: &dyn Deployer,
    store: &dyn ConfigMapStore,
) -> Result<UninstallReport> {
    let bundle =
        CompiledBundle::load(bundle_dir).map_err(|e| KubeError::Validation(e.to_string()))?;
    let release_id = bundle.release_id();
    let namespace = bundle.release_namespace();

    gate.ensure(release_id).await?;

    let mut report = UninstallReport::default();

    for kind in [SubReleaseKind::Resources, SubReleaseKind::Namespaces] {
        let release = kind.release_name(release_id);
        if deployer.release_exists(&release, namespace).await? {
            deployer.uninstall(&release, namespace).await?;
            report.releases.push(release);
        } else {
            info!(release = %release, "not installed");
        }
    }

    for kind in SubReleaseKind::ALL {
        if delete_marker(store, namespace, &kind.release_name(release_id)).await? {
            report.markers += 1;
        }
    }

    Ok(report)
}
