//! Helmet cluster side
//!
//! Deploys compiled bundles idempotently:
//!
//! - **Whitelist**: a release must be whitelisted before it is touched
//! - **Planning**: content digests decide which sub-releases changed
//! - **Execution**: CRDs, namespaces and resources are deployed in order,
//!   each carrying a digest marker that is removed again on failure
//!
//! ## Example
//!
//! ```rust,no_run
//! use helmet_kube::{
//!     DeploymentExecutor, DeploymentPlanner, HelmDeployer, HelmOptions, KubeConfigMapStore,
//!     WhitelistGate, deploy_bundles,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = Arc::new(KubeConfigMapStore::with_client(client.clone()));
//! let deployer = Arc::new(HelmDeployer::new(client, "helm", "helmet"));
//!
//! let gate = WhitelistGate::new(store.clone(), "default", 5);
//! let planner = DeploymentPlanner::new(store.clone());
//! let executor = DeploymentExecutor::new(deployer, store, HelmOptions::default());
//!
//! for report in deploy_bundles(&gate, &planner, &executor, &["./out/foo".into()]).await? {
//!     println!("{}: {:?}", report.bundle.display(), report.result.is_ok());
//! }
//! # Ok(())
//! # }
//! ```

pub mod deployer;
pub mod error;
pub mod executor;
pub mod marker;
pub mod planner;
pub mod store;
pub mod uninstall;
pub mod whitelist;

// Re-exports for convenience
pub use deployer::{DeployCall, Deployer, HelmDeployer, HelmOptions, HelmRequest, MockDeployer};
pub use error::{KubeError, Result};
pub use executor::{BundleReport, DeploymentExecutor, deploy_bundles};
pub use marker::{MARKER_PREFIX, marker_name};
pub use planner::{DeploymentPlan, DeploymentPlanner, SubReleasePlan, SubReleaseState};
pub use store::{
    ConfigMapStore, KubeConfigMapStore, MockConfigMapStore, OperationCounts, StoredConfigMap,
};
pub use uninstall::{UninstallReport, uninstall_bundle};
pub use whitelist::{WHITELIST_NAME, Whitelist, WhitelistChange, WhitelistGate};
