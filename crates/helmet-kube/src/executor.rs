//! Deployment execution
//!
//! Sub-releases are deployed strictly in order (CRDs, namespaces,
//! resources). Each deployment carries its digest marker, so the marker only
//! lands in the cluster together with the content it describes. When a
//! deployment fails, the marker is deleted again so that the next run does
//! not skip the sub-release.

use futures::future::join_all;
use helmet_core::SubReleaseKind;
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::deployer::{Deployer, HelmOptions, HelmRequest, read_documents};
use crate::error::Result;
use crate::marker::{MARKER_TEMPLATE_FILE, delete_marker, marker_document};
use crate::planner::{DeploymentPlan, DeploymentPlanner, SubReleasePlan, SubReleaseState};
use crate::store::ConfigMapStore;
use crate::whitelist::WhitelistGate;

/// Applies deployment plans
#[derive(Clone)]
pub struct DeploymentExecutor {
    deployer: Arc<dyn Deployer>,
    store: Arc<dyn ConfigMapStore>,
    options: HelmOptions,
}

/// Outcome of deploying one bundle
#[derive(Debug)]
pub struct BundleReport {
    pub bundle: PathBuf,
    pub result: Result<DeploymentPlan>,
}

impl DeploymentExecutor {
    pub fn new(
        deployer: Arc<dyn Deployer>,
        store: Arc<dyn ConfigMapStore>,
        options: HelmOptions,
    ) -> Self {
        Self {
            deployer,
            store,
            options,
        }
    }

    /// Execute a plan, updating the state of each sub-release
    ///
    /// Stops at the first failure, whose error is returned after the failed
    /// sub-release's marker has been removed.
    pub async fn execute(&self, plan: &mut DeploymentPlan) -> Result<()> {
        for kind in SubReleaseKind::ALL {
            let sub = plan.sub_release(kind).clone();
            if !sub.should_install() {
                debug!(release = %sub.release_name, "skipped");
                continue;
            }

            if sub.digest.is_none() {
                // An impure deployment must not leave an older digest claiming it
                self.remove_marker(&plan.namespace, &sub.release_name).await;
            }

            let result = match kind {
                SubReleaseKind::Crds => self.apply_crds(&plan.namespace, &sub).await,
                _ => self.deploy_release(&plan.namespace, &sub).await,
            };

            match result {
                Ok(()) => {
                    info!(release = %sub.release_name, "deployed");
                    plan.sub_release_mut(kind).state = SubReleaseState::Installed;
                }
                Err(e) => {
                    self.remove_marker(&plan.namespace, &sub.release_name).await;
                    plan.sub_release_mut(kind).state = SubReleaseState::RolledBack;
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Server-side apply the rendered CRDs, followed by their marker
    async fn apply_crds(&self, namespace: &str, sub: &SubReleasePlan) -> Result<()> {
        let mut documents = Vec::new();
        for file in &sub.rendered_files {
            documents.extend(read_documents(file)?);
        }

        if let Some(digest) = &sub.digest {
            if self.options.create_namespace {
                documents.push(namespace_document(namespace));
            }
            documents.push(marker_document(&sub.release_name, namespace, digest));
        }

        info!(release = %sub.release_name, count = documents.len(), "applying CRDs");
        self.deployer.apply_documents(namespace, &documents).await
    }

    /// Install or upgrade a Helm release with its marker in the templates
    async fn deploy_release(&self, namespace: &str, sub: &SubReleasePlan) -> Result<()> {
        let marker_file = sub.chart_path.join("templates").join(MARKER_TEMPLATE_FILE);

        if let Some(digest) = &sub.digest {
            let document = marker_document(&sub.release_name, namespace, digest);
            write_marker_template(&marker_file, &document)?;
        }

        let result = self.helm_deploy(namespace, sub).await;

        if let Err(e) = std::fs::remove_file(&marker_file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %marker_file.display(), error = %e, "failed to remove marker template");
            }
        }

        result
    }

    async fn helm_deploy(&self, namespace: &str, sub: &SubReleasePlan) -> Result<()> {
        let request = HelmRequest {
            release_name: sub.release_name.clone(),
            namespace: namespace.to_string(),
            chart_path: sub.chart_path.clone(),
            options: self.options.clone(),
        };

        if self.deployer.release_exists(&sub.release_name, namespace).await? {
            self.deployer.upgrade(&request).await
        } else {
            self.deployer.install(&request).await
        }
    }

    /// Best-effort marker delete
    async fn remove_marker(&self, namespace: &str, release_name: &str) {
        match delete_marker(self.store.as_ref(), namespace, release_name).await {
            Ok(true) => debug!(release = release_name, "digest marker removed"),
            Ok(false) => {}
            Err(e) => warn!(release = release_name, error = %e, "failed to remove digest marker"),
        }
    }
}

fn write_marker_template(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(document)?)?;
    Ok(())
}

fn namespace_document(namespace: &str) -> Value {
    let mut metadata = Mapping::new();
    metadata.insert("name".into(), namespace.into());

    let mut doc = Mapping::new();
    doc.insert("apiVersion".into(), "v1".into());
    doc.insert("kind".into(), "Namespace".into());
    doc.insert("metadata".into(), Value::Mapping(metadata));
    Value::Mapping(doc)
}

/// Deploy several bundles
///
/// The whitelist is read once. Planning runs concurrently, then the plans
/// are executed one bundle at a time. Each bundle gets its own report; only a
/// failure to read the whitelist fails the whole call.
pub async fn deploy_bundles(
    gate: &WhitelistGate,
    planner: &DeploymentPlanner,
    executor: &DeploymentExecutor,
    bundles: &[PathBuf],
) -> Result<Vec<BundleReport>> {
    let whitelist = gate.fetch().await?;

    let plans = join_all(
        bundles
            .iter()
            .map(|bundle| planner.plan(bundle, &whitelist)),
    )
    .await;

    let mut reports = Vec::with_capacity(bundles.len());
    for (bundle, plan) in bundles.iter().zip(plans) {
        let result = match plan {
            Ok(mut plan) => {
                if plan.pending_count() == 0 {
                    info!(bundle = %plan.name, "up to date");
                }
                executor.execute(&mut plan).await.map(|_| plan)
            }
            Err(e) => Err(e),
        };

        reports.push(BundleReport {
            bundle: bundle.clone(),
            result,
        });
    }

    Ok(reports)
}
