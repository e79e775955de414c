//! Helmet chart synchronization
//!
//! This crate keeps a local directory of third-party charts in line with a
//! manifest of remote sources:
//!
//! - **Helm repositories**: `index.yaml` resolution against a version range
//! - **OCI registries**: exact tags pulled with `oci-distribution`
//! - **Remote archives**: `.zip`/`.tgz` downloads with a chart sub-path
//!
//! Every chart is staged and validated before it atomically replaces the
//! local copy, so a failed update never leaves a half-written chart behind.
//!
//! ## Example
//!
//! ```rust,no_run
//! use helmet_repo::{ChartManifest, ChartSynchronizer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = ChartManifest::load("charts.yaml".as_ref())?;
//! let sync = ChartSynchronizer::new("./charts", "./types")?;
//!
//! for report in sync.sync(manifest.select(None)).await {
//!     println!("{}: {:?}", report.name, report.result);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fetcher;
pub mod hooks;
pub mod http;
pub mod index;
pub mod manifest;
pub mod oci;
pub mod source;
pub mod sync;

// Re-exports for convenience
pub use error::{RepoError, Result};
pub use fetcher::{ChartFetcher, FetchOrigin, StagedChart};
pub use hooks::{ChartHook, CommandHook, HookContext, NoopHook};
pub use http::{HttpClient, IndexCache};
pub use index::{coerce_version, ChartRepoIndex, ChartRepoRelease, ResolvedRelease, VersionConstraint};
pub use manifest::{ChartEntry, ChartManifest, HookCommands};
pub use oci::OciPuller;
pub use source::{HelmRepoSource, OciRegistrySource, RemoteArchiveSource, RemoteChartSource};
pub use sync::{ChartSynchronizer, ChartUpdateOutcome, ChartUpdateReport};
