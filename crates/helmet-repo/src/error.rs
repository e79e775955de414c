//! Error types for chart synchronization

use std::sync::Arc;
use thiserror::Error;

/// Chart synchronization errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Resolution Errors ============
    #[error(
        "No version of {name} satisfies {constraint}, available versions: {}",
        format_available(.available)
    )]
    VersionResolution {
        name: String,
        constraint: String,
        available: Vec<String>,
    },

    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("Chart {name} not found in index {url}")]
    ChartNotInIndex { name: String, url: String },

    #[error("Release {name}@{version} has no download URL")]
    EmptyReleaseUrl { name: String, version: String },

    // ============ Network Errors ============
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Request timeout after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // ============ Index Errors ============
    #[error("Index parse error: {message}")]
    IndexParseError { message: String },

    #[error("Repository index {url} is unavailable: {source}")]
    IndexUnavailable {
        url: String,
        #[source]
        source: Arc<RepoError>,
    },

    // ============ OCI Errors ============
    #[error("OCI registry error: {message}")]
    OciError { message: String },

    #[error("Invalid OCI reference: {reference}")]
    InvalidOciReference { reference: String },

    // ============ Fetch Errors ============
    #[error("Unsupported archive type: {url} (expected .zip, .tgz or .tar.gz)")]
    UnsupportedArchive { url: String },

    #[error("Fetched content for {name} is not a valid chart: {message}")]
    InvalidStagedChart { name: String, message: String },

    #[error("Local chart {name} has an invalid Chart.yaml: {message}")]
    InvalidChartMetadata { name: String, message: String },

    #[error("Hook '{hook}' failed for {name}: {message}")]
    HookFailed {
        name: String,
        hook: String,
        message: String,
    },

    // ============ Manifest Errors ============
    #[error("Invalid chart manifest: {message}")]
    InvalidManifest { message: String },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Core(#[from] helmet_core::CoreError),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    }
}

impl RepoError {
    /// Whether this error belongs to the fetch family (network, archive,
    /// registry, staging), as opposed to resolution or local errors
    pub fn is_fetch_error(&self) -> bool {
        if let RepoError::IndexUnavailable { source, .. } = self {
            return source.is_fetch_error();
        }
        matches!(
            self,
            RepoError::HttpError { .. }
                | RepoError::NetworkError { .. }
                | RepoError::Timeout { .. }
                | RepoError::OciError { .. }
                | RepoError::UnsupportedArchive { .. }
                | RepoError::InvalidStagedChart { .. }
                | RepoError::IndexParseError { .. }
        ) || matches!(
            self,
            RepoError::Core(
                helmet_core::CoreError::Archive { .. }
                    | helmet_core::CoreError::UnsafeArchivePath { .. }
            )
        )
    }

    /// Whether this error is a version resolution failure
    pub fn is_resolution_error(&self) -> bool {
        if let RepoError::IndexUnavailable { source, .. } = self {
            return source.is_resolution_error();
        }
        matches!(
            self,
            RepoError::VersionResolution { .. }
                | RepoError::InvalidConstraint { .. }
                | RepoError::ChartNotInIndex { .. }
                | RepoError::EmptyReleaseUrl { .. }
        )
    }
}

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                seconds: crate::http::REQUEST_TIMEOUT_SECS,
            }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for RepoError {
    fn from(e: url::ParseError) -> Self {
        RepoError::InvalidUrl {
            url: String::new(),
            reason: e.to_string(),
        }
    }
}
