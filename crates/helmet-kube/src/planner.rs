//! Deployment planning
//!
//! Planning is read-only: it loads a compiled bundle, checks it against the
//! whitelist and compares the digest of each sub-release with the marker
//! recorded in the cluster.

use helmet_core::{CompiledBundle, SubReleaseKind, digest_dir};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::{KubeError, Result};
use crate::marker::read_marker;
use crate::store::ConfigMapStore;
use crate::whitelist::Whitelist;

/// Per sub-release state, carried from planning through execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubReleaseState {
    /// Nothing to deploy
    Skip,
    /// Planned for (re)deployment
    Install,
    /// Deployed and marker recorded
    Installed,
    /// Deployment failed; marker removed
    RolledBack,
}

/// Plan of one sub-release
#[derive(Debug, Clone)]
pub struct SubReleasePlan {
    pub kind: SubReleaseKind,

    /// `<release id>-<kind>`
    pub release_name: String,

    /// Sub-release directory (the Helm chart for namespaces and resources)
    pub chart_path: PathBuf,

    /// Folder of rendered documents
    pub rendered_path: PathBuf,

    /// Rendered documents, sorted
    pub rendered_files: Vec<PathBuf>,

    /// Digest of the rendered documents; `None` for impure bundles
    pub digest: Option<String>,

    pub state: SubReleaseState,
}

impl SubReleasePlan {
    pub fn should_install(&self) -> bool {
        self.state == SubReleaseState::Install
    }
}

/// Plan of a whole bundle
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Release id
    pub name: String,

    /// Namespace of release records and markers
    pub namespace: String,

    pub pure: bool,

    /// Sub-releases in deployment order: CRDs, namespaces, resources
    pub sub_releases: [SubReleasePlan; 3],
}

impl DeploymentPlan {
    pub fn sub_release(&self, kind: SubReleaseKind) -> &SubReleasePlan {
        &self.sub_releases[index(kind)]
    }

    pub fn sub_release_mut(&mut self, kind: SubReleaseKind) -> &mut SubReleasePlan {
        &mut self.sub_releases[index(kind)]
    }

    pub fn should_install_crds(&self) -> bool {
        self.sub_release(SubReleaseKind::Crds).should_install()
    }

    pub fn should_install_namespaces(&self) -> bool {
        self.sub_release(SubReleaseKind::Namespaces).should_install()
    }

    pub fn should_install_resources(&self) -> bool {
        self.sub_release(SubReleaseKind::Resources).should_install()
    }

    /// Number of sub-releases still planned for installation
    pub fn pending_count(&self) -> usize {
        self.sub_releases.iter().filter(|s| s.should_install()).count()
    }
}

fn index(kind: SubReleaseKind) -> usize {
    match kind {
        SubReleaseKind::Crds => 0,
        SubReleaseKind::Namespaces => 1,
        SubReleaseKind::Resources => 2,
    }
}

/// Builds deployment plans
#[derive(Clone)]
pub struct DeploymentPlanner {
    store: Arc<dyn ConfigMapStore>,
    ignore_purity: bool,
}

impl DeploymentPlanner {
    pub fn new(store: Arc<dyn ConfigMapStore>) -> Self {
        Self {
            store,
            ignore_purity: false,
        }
    }

    /// Install every sub-release regardless of recorded digests
    pub fn ignore_purity(mut self, ignore: bool) -> Self {
        self.ignore_purity = ignore;
        self
    }

    /// Plan the deployment of the bundle at `bundle_dir`
    pub async fn plan(&self, bundle_dir: &Path, whitelist: &Whitelist) -> Result<DeploymentPlan> {
        let bundle =
            CompiledBundle::load(bundle_dir).map_err(|e| KubeError::Validation(e.to_string()))?;

        whitelist.require(bundle.release_id())?;

        let pure = bundle.meta.pure;
        let compare = pure && !self.ignore_purity;

        let crds = self.plan_sub_release(&bundle, SubReleaseKind::Crds, compare).await?;
        let namespaces = self
            .plan_sub_release(&bundle, SubReleaseKind::Namespaces, compare)
            .await?;
        let resources = self
            .plan_sub_release(&bundle, SubReleaseKind::Resources, compare)
            .await?;

        Ok(DeploymentPlan {
            name: bundle.release_id().to_string(),
            namespace: bundle.release_namespace().to_string(),
            pure,
            sub_releases: [crds, namespaces, resources],
        })
    }

    async fn plan_sub_release(
        &self,
        bundle: &CompiledBundle,
        kind: SubReleaseKind,
        compare: bool,
    ) -> Result<SubReleasePlan> {
        let release_name = kind.release_name(bundle.release_id());
        let rendered_files = bundle.rendered_files(kind)?;

        let mut plan = SubReleasePlan {
            kind,
            release_name,
            chart_path: bundle.sub_release_dir(kind),
            rendered_path: bundle.rendered_dir(kind),
            rendered_files,
            digest: None,
            state: SubReleaseState::Install,
        };

        if kind == SubReleaseKind::Crds && plan.rendered_files.is_empty() {
            debug!(release = %plan.release_name, "no CRDs rendered, skipping");
            plan.state = SubReleaseState::Skip;
            return Ok(plan);
        }

        if bundle.meta.pure {
            plan.digest = Some(digest_rendered(plan.rendered_path.clone()).await?);
        }

        if compare {
            let recorded =
                read_marker(self.store.as_ref(), bundle.release_namespace(), &plan.release_name)
                    .await?;

            if recorded.is_some() && recorded == plan.digest {
                debug!(release = %plan.release_name, "digest unchanged, skipping");
                plan.state = SubReleaseState::Skip;
            } else {
                debug!(
                    release = %plan.release_name,
                    recorded = recorded.as_deref().unwrap_or("none"),
                    "digest changed"
                );
            }
        }

        Ok(plan)
    }
}

async fn digest_rendered(dir: PathBuf) -> Result<String> {
    let digest = tokio::task::spawn_blocking(move || digest_dir(&dir))
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{DIGEST_KEY, marker_name};
    use crate::store::{MockConfigMapStore, StoredConfigMap};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn bundle(pure: bool, crds: bool) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("meta.json"),
            format!(r#"{{"name":"foo","namespace":"ns","pure":{}}}"#, pure),
        )
        .unwrap();
        for kind in ["crds", "namespaces", "resources"] {
            let rendered = dir.path().join(kind).join("rendered");
            std::fs::create_dir_all(&rendered).unwrap();
            if kind != "crds" || crds {
                std::fs::write(rendered.join("a.yaml"), format!("kind: {}\n", kind)).unwrap();
            }
        }
        dir
    }

    fn whitelist(ids: &[&str]) -> Whitelist {
        Whitelist {
            ids: ids.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            token: None,
        }
    }

    #[tokio::test]
    async fn test_not_whitelisted_reads_nothing() {
        let store = MockConfigMapStore::new();
        let planner = DeploymentPlanner::new(Arc::new(store.clone()));
        let dir = bundle(true, true);

        let err = planner.plan(dir.path(), &whitelist(&["bar"])).await.unwrap_err();
        assert!(matches!(err, KubeError::NotWhitelisted { .. }));
        assert_eq!(store.operation_counts().gets, 0);
    }

    #[tokio::test]
    async fn test_malformed_meta_is_validation_error() {
        let planner = DeploymentPlanner::new(Arc::new(MockConfigMapStore::new()));
        let dir = bundle(true, true);
        std::fs::write(dir.path().join("meta.json"), "{not json").unwrap();

        let err = planner.plan(dir.path(), &whitelist(&["foo"])).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_fresh_pure_bundle_installs_everything() {
        let planner = DeploymentPlanner::new(Arc::new(MockConfigMapStore::new()));
        let dir = bundle(true, true);

        let plan = planner.plan(dir.path(), &whitelist(&["foo"])).await.unwrap();
        assert_eq!(plan.pending_count(), 3);
        assert!(plan.sub_releases.iter().all(|s| s.digest.is_some()));
        assert_eq!(plan.sub_release(SubReleaseKind::Resources).release_name, "foo-resources");
    }

    #[tokio::test]
    async fn test_matching_marker_skips() {
        let store = MockConfigMapStore::new();
        let dir = bundle(true, false);
        let digest = digest_dir(&dir.path().join("namespaces/rendered")).unwrap();

        let mut cm = StoredConfigMap::new("ns", marker_name("foo-namespaces"));
        cm.data.insert(DIGEST_KEY.to_string(), digest);
        store.upsert(cm);

        let planner = DeploymentPlanner::new(Arc::new(store));
        let plan = planner.plan(dir.path(), &whitelist(&["foo"])).await.unwrap();

        assert_eq!(plan.sub_release(SubReleaseKind::Crds).state, SubReleaseState::Skip);
        assert!(!plan.should_install_namespaces());
        assert!(plan.should_install_resources());
    }

    #[tokio::test]
    async fn test_impure_bundle_always_installs() {
        let planner = DeploymentPlanner::new(Arc::new(MockConfigMapStore::new()));
        let dir = bundle(false, false);

        let plan = planner.plan(dir.path(), &whitelist(&["foo"])).await.unwrap();
        assert!(!plan.should_install_crds());
        assert_eq!(plan.pending_count(), 2);
        assert!(plan.sub_releases.iter().all(|s| s.digest.is_none()));
    }
}
