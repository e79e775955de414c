//! Error types for helmet-kube

use thiserror::Error;

/// Result type for helmet-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while gating, planning or deploying bundles
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Malformed bundle or document
    #[error("validation error: {0}")]
    Validation(String),

    /// Release id absent from the whitelist
    #[error("release '{release_id}' is not whitelisted (whitelisted: {})", format_ids(.whitelisted))]
    NotWhitelisted {
        release_id: String,
        whitelisted: Vec<String>,
    },

    /// Whitelist changed between read and write
    #[error("whitelist {namespace}/{name} was modified concurrently\nHint: retry the operation")]
    WhitelistConflict { namespace: String, name: String },

    /// Token-guarded write rejected by the store
    #[error("ConfigMap {namespace}/{name} was modified concurrently")]
    Conflict { namespace: String, name: String },

    /// External command failed
    #[error("command `{command}` failed ({}): {stderr}", format_code(.code))]
    Subprocess {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// Mock-injected or otherwise simulated deployment failure
    #[error("deployment of '{release}' failed: {message}")]
    DeploymentFailed { release: String, message: String },

    #[error(transparent)]
    Core(#[from] helmet_core::CoreError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn format_ids(ids: &[String]) -> String {
    if ids.is_empty() {
        "none".to_string()
    } else {
        ids.join(", ")
    }
}

fn format_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "terminated by signal".to_string(),
    }
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 404)
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        matches!(self, KubeError::Conflict { .. } | KubeError::WhitelistConflict { .. })
            || matches!(self, KubeError::Api(kube::Error::Api(resp)) if resp.code == 409)
    }

    /// Check if this error is about the bundle itself rather than the cluster
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            KubeError::Validation(_)
                | KubeError::Core(helmet_core::CoreError::InvalidBundle { .. })
        )
    }
}
