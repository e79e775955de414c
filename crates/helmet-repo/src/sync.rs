//! Chart synchronization
//!
//! One task per chart. Tasks sharing a Helm repository share its index
//! through the `IndexCache`; everything else about a chart update (resolve,
//! fetch, stage, replace, hooks) runs sequentially inside its own task.

use futures::future::join_all;
use helmet_core::ChartMetadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

use crate::error::{RepoError, Result};
use crate::fetcher::{replace_chart_dir, ChartFetcher, FetchOrigin};
use crate::hooks::{ChartHook, CommandHook, HookContext};
use crate::http::{HttpClient, IndexCache};
use crate::index::{coerce_version, index_url, VersionConstraint};
use crate::manifest::ChartEntry;
use crate::source::RemoteChartSource;

/// What happened to one chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartUpdateOutcome {
    /// The local copy already has the wanted version
    UpToDate { version: String },

    /// The local copy was replaced (`from` is `None` on first download)
    Updated { from: Option<String>, to: String },
}

/// Per-chart result of a synchronization run
#[derive(Debug)]
pub struct ChartUpdateReport {
    pub name: String,
    pub result: Result<ChartUpdateOutcome>,
}

/// Keeps a directory of charts in line with their remote sources
pub struct ChartSynchronizer {
    charts_dir: PathBuf,
    types_dir: PathBuf,
    index_cache: Arc<IndexCache>,
    fetcher: ChartFetcher,
}

impl ChartSynchronizer {
    pub fn new(charts_dir: impl Into<PathBuf>, types_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_client(HttpClient::new()?, charts_dir, types_dir))
    }

    pub fn with_client(
        http: HttpClient,
        charts_dir: impl Into<PathBuf>,
        types_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            charts_dir: charts_dir.into(),
            types_dir: types_dir.into(),
            index_cache: Arc::new(IndexCache::new(http.clone())),
            fetcher: ChartFetcher::new(http),
        }
    }

    /// Directory charts are written into
    pub fn charts_dir(&self) -> &Path {
        &self.charts_dir
    }

    /// Update every given chart concurrently
    ///
    /// Reports come back in input order. A failing chart never stops the
    /// others.
    pub async fn sync(&self, charts: Vec<(&str, &ChartEntry)>) -> Vec<ChartUpdateReport> {
        let tasks = charts.into_iter().map(|(name, entry)| async move {
            let hook = CommandHook::new(entry.hooks.clone());
            let result = self.update_chart(name, &entry.source, &hook).await;

            match &result {
                Ok(outcome) => tracing::debug!(chart = name, ?outcome, "chart synchronized"),
                Err(e) => tracing::warn!(chart = name, error = %e, "chart update failed"),
            }

            ChartUpdateReport {
                name: name.to_string(),
                result,
            }
        });

        join_all(tasks).await
    }

    /// Bring one chart up to date with its source
    pub async fn update_chart(
        &self,
        name: &str,
        source: &RemoteChartSource,
        hook: &dyn ChartHook,
    ) -> Result<ChartUpdateOutcome> {
        let chart_path = self.charts_dir.join(name);

        let current = ChartMetadata::load_existing(&chart_path).map_err(|e| {
            RepoError::InvalidChartMetadata {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;
        let current_version = current.map(|m| m.version);

        let Some((target_version, origin)) =
            self.plan_fetch(source, current_version.as_deref()).await?
        else {
            return Ok(ChartUpdateOutcome::UpToDate {
                version: current_version.unwrap_or_default(),
            });
        };

        let staged = self
            .fetcher
            .fetch_and_stage(&self.charts_dir, name, &origin)
            .await?;

        if !same_version(&staged.metadata.version, &target_version) {
            tracing::warn!(
                chart = name,
                expected = %target_version,
                found = %staged.metadata.version,
                "fetched chart declares a different version"
            );
        }

        hook.on_downloaded(&HookContext {
            chart_name: name,
            chart_path: &staged.path,
            types_path: &self.types_dir,
            source,
        })
        .await?;

        replace_chart_dir(staged, &chart_path).await?;
        tracing::info!(chart = name, version = %target_version, "chart replaced");

        hook.on_updated(&HookContext {
            chart_name: name,
            chart_path: &chart_path,
            types_path: &self.types_dir,
            source,
        })
        .await?;

        Ok(ChartUpdateOutcome::Updated {
            from: current_version,
            to: target_version,
        })
    }

    /// Decide the version to fetch and where from, or `None` if up to date
    async fn plan_fetch(
        &self,
        source: &RemoteChartSource,
        current: Option<&str>,
    ) -> Result<Option<(String, FetchOrigin)>> {
        let is_current = |wanted: &str| current.is_some_and(|c| same_version(c, wanted));

        match source {
            RemoteChartSource::HelmRepo(s) => {
                let constraint = VersionConstraint::parse(&s.version_constraint)?;
                let url = index_url(&s.remote_repo_url);
                let index = self.index_cache.get(&url).await?;
                let resolved =
                    index.resolve(&url, &s.remote_name, s.api_version.as_deref(), &constraint)?;

                let version = resolved.release.version.clone();
                if is_current(&version) {
                    return Ok(None);
                }

                let origin = FetchOrigin::Archive {
                    url: resolved.download_url(&url)?,
                    format: helmet_core::ArchiveFormat::TarGz,
                    subpath: None,
                };
                Ok(Some((version, origin)))
            }
            RemoteChartSource::OciRegistry(s) => {
                if is_current(&s.version) {
                    return Ok(None);
                }
                let origin = FetchOrigin::Oci {
                    reference: s.oci_ref.clone(),
                    tag: s.version.clone(),
                };
                Ok(Some((s.version.clone(), origin)))
            }
            RemoteChartSource::RemoteArchive(s) => {
                if is_current(&s.version) {
                    return Ok(None);
                }
                let url = Url::parse(&s.archive_url).map_err(|e| RepoError::InvalidUrl {
                    url: s.archive_url.clone(),
                    reason: e.to_string(),
                })?;
                let origin = FetchOrigin::archive(url, Some(s.extract_path.clone()))?;
                Ok(Some((s.version.clone(), origin)))
            }
        }
    }
}

/// Versions are equal as strings or once coerced (`v1.2.0` == `1.2.0`)
fn same_version(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (coerce_version(a), coerce_version(b)) {
        (Some(va), Some(vb)) => va == vb,
        _ => false,
    }
}
