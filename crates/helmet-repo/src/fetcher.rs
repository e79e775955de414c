//! Chart download, staging and atomic replacement
//!
//! Content is always staged in a temporary directory created inside the charts
//! directory, validated there, and only then swapped into place with renames
//! on the same filesystem. Any failure before the swap drops the staging
//! directory and leaves the existing chart untouched.

use helmet_core::{archive, ArchiveFormat, ChartMetadata};
use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;
use url::Url;

use crate::error::{RepoError, Result};
use crate::http::HttpClient;
use crate::oci::OciPuller;

/// Prefix of staging directories inside the charts directory
const STAGING_PREFIX: &str = ".helmet-staging-";

/// Where the bytes of a chart come from
#[derive(Debug, Clone)]
pub enum FetchOrigin {
    /// A chart archive over HTTP(S)
    Archive {
        url: Url,
        format: ArchiveFormat,
        /// Chart location below the archive's top-level directory
        subpath: Option<String>,
    },
    /// A Helm chart in an OCI registry
    Oci { reference: String, tag: String },
}

impl FetchOrigin {
    /// Archive origin for a URL, detecting the format from its path
    pub fn archive(url: Url, subpath: Option<String>) -> Result<Self> {
        let format = ArchiveFormat::detect(url.path()).ok_or_else(|| {
            RepoError::UnsupportedArchive {
                url: url.to_string(),
            }
        })?;

        if let Some(sub) = &subpath {
            validate_subpath(sub)?;
        }

        Ok(Self::Archive {
            url,
            format,
            subpath,
        })
    }
}

/// Downloaded archive bytes
#[derive(Debug)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub format: ArchiveFormat,
    pub subpath: Option<String>,
}

/// A validated chart waiting in its staging directory
#[derive(Debug)]
pub struct StagedChart {
    staging: TempDir,

    /// Root of the staged chart
    pub path: PathBuf,

    /// Its parsed `Chart.yaml`
    pub metadata: ChartMetadata,
}

/// Downloads and stages charts
#[derive(Clone)]
pub struct ChartFetcher {
    http: HttpClient,
    oci: std::sync::Arc<OciPuller>,
}

impl ChartFetcher {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            oci: std::sync::Arc::new(OciPuller::new()),
        }
    }

    /// Retrieve the archive bytes for an origin
    pub async fn download(&self, origin: &FetchOrigin) -> Result<Download> {
        match origin {
            FetchOrigin::Archive {
                url,
                format,
                subpath,
            } => {
                tracing::info!(url = %url, "downloading chart archive");
                let bytes = self.http.get_bytes(url.as_str()).await?;
                Ok(Download {
                    bytes,
                    format: *format,
                    subpath: subpath.clone(),
                })
            }
            FetchOrigin::Oci { reference, tag } => {
                let bytes = self.oci.pull_chart(reference, tag).await?;
                Ok(Download {
                    bytes,
                    format: ArchiveFormat::TarGz,
                    subpath: None,
                })
            }
        }
    }

    /// Download, extract and validate a chart under `charts_dir`
    pub async fn fetch_and_stage(
        &self,
        charts_dir: &Path,
        chart_name: &str,
        origin: &FetchOrigin,
    ) -> Result<StagedChart> {
        let download = self.download(origin).await?;
        stage(charts_dir, chart_name, download).await
    }
}

/// Extract a download into a fresh staging directory and validate it
pub async fn stage(charts_dir: &Path, chart_name: &str, download: Download) -> Result<StagedChart> {
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(charts_dir)?;
    let unpacked = staging.path().join("unpacked");
    let name = chart_name.to_string();

    let chart_root = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        archive::extract(&download.bytes, download.format, &unpacked)?;

        let root = match &download.subpath {
            Some(sub) => unpacked.join(sub),
            None => unpacked,
        };

        if !root.is_dir() {
            return Err(RepoError::InvalidStagedChart {
                name,
                message: match &download.subpath {
                    Some(sub) => format!("archive has no '{}' directory", sub),
                    None => "archive is empty".to_string(),
                },
            });
        }

        if std::fs::read_dir(&root)?.next().is_none() {
            return Err(RepoError::InvalidStagedChart {
                name,
                message: "chart directory is empty".to_string(),
            });
        }

        Ok(root)
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))??;

    let metadata = ChartMetadata::load(&chart_root).map_err(|e| RepoError::InvalidStagedChart {
        name: chart_name.to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!(
        chart = chart_name,
        version = %metadata.version,
        path = %chart_root.display(),
        "staged chart"
    );

    Ok(StagedChart {
        staging,
        path: chart_root,
        metadata,
    })
}

/// Swap a staged chart into `target`
///
/// The previous tree is renamed aside, the staged tree renamed into place and
/// the previous tree deleted with the staging directory. If moving the staged
/// tree fails the previous tree is restored.
pub async fn replace_chart_dir(staged: StagedChart, target: &Path) -> Result<()> {
    let target = target.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let StagedChart { staging, path, .. } = staged;
        let previous = staging.path().join("previous");
        let had_previous = target.exists();

        if had_previous {
            std::fs::rename(&target, &previous)?;
        }

        if let Err(e) = std::fs::rename(&path, &target) {
            if had_previous {
                if let Err(restore) = std::fs::rename(&previous, &target) {
                    tracing::error!(
                        path = %target.display(),
                        error = %restore,
                        "failed to restore previous chart"
                    );
                }
            }
            return Err(e.into());
        }

        drop(staging);
        Ok(())
    })
    .await
    .map_err(|e| std::io::Error::other(e.to_string()))?
}

fn validate_subpath(subpath: &str) -> Result<()> {
    let path = Path::new(subpath);
    let valid = !subpath.trim().is_empty()
        && path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if !valid {
        return Err(RepoError::InvalidManifest {
            message: format!("extractPath '{}' must be a relative path inside the archive", subpath),
        });
    }
    Ok(())
}
