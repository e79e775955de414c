//! CLI error types with exit code handling
//!
//! Every library error is folded into a [`CliError`], which knows the exit
//! code the process ends with.

use helmet_core::CoreError;
use helmet_kube::KubeError;
use helmet_repo::RepoError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Malformed bundle, manifest, config or arguments
    #[error("Validation failed: {message}")]
    #[diagnostic(code(helmet::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Release id missing from the whitelist
    #[error("{message}")]
    #[diagnostic(
        code(helmet::cli::not_whitelisted),
        help("run `helmet whitelist <bundle>` first")
    )]
    NotWhitelisted { message: String },

    /// Version resolution or download failed
    #[error("Fetch failed: {message}")]
    #[diagnostic(code(helmet::cli::fetch))]
    Fetch { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(helmet::cli::io))]
    Io { message: String },

    /// Kubernetes API or helm failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(helmet::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Some units of a batch failed
    #[error("{failed} of {total} {unit} failed")]
    #[diagnostic(code(helmet::cli::batch))]
    Batch {
        failed: usize,
        total: usize,
        unit: &'static str,
        /// Exit code of the first failure
        code: i32,
    },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(helmet::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::NotWhitelisted { .. } => exit_codes::NOT_WHITELISTED,
            CliError::Fetch { .. } => exit_codes::FETCH_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Batch { code, .. } => *code,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: None,
        }
    }

    /// Create a validation error with help text
    pub fn validation_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Summarize a batch from the errors of its failed units
    pub fn batch<'a>(
        unit: &'static str,
        total: usize,
        failures: impl IntoIterator<Item = &'a CliError>,
    ) -> Option<Self> {
        let failures: Vec<_> = failures.into_iter().collect();
        let first = failures.first()?;
        Some(Self::Batch {
            failed: failures.len(),
            total,
            unit,
            code: first.exit_code(),
        })
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::validation(other.to_string()),
        }
    }
}

impl From<RepoError> for CliError {
    fn from(err: RepoError) -> Self {
        if err.is_fetch_error() || err.is_resolution_error() {
            return CliError::Fetch {
                message: err.to_string(),
            };
        }

        match err {
            RepoError::Io(e) => e.into(),
            RepoError::Core(e) => e.into(),
            RepoError::InvalidManifest { .. }
            | RepoError::InvalidChartMetadata { .. }
            | RepoError::Serialization(_) => CliError::validation(err.to_string()),
            other => CliError::Other {
                message: other.to_string(),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        if err.is_validation() {
            return CliError::validation(err.to_string());
        }

        match err {
            KubeError::NotWhitelisted { .. } => CliError::NotWhitelisted {
                message: err.to_string(),
            },
            KubeError::Io(e) => e.into(),
            KubeError::Core(e) => e.into(),
            KubeError::WhitelistConflict { .. } => CliError::Cluster {
                message: err.to_string(),
                help: Some("another writer changed the whitelist; retry".to_string()),
            },
            KubeError::Subprocess { .. } => CliError::Cluster {
                message: err.to_string(),
                help: Some("check that helm is installed and on PATH".to_string()),
            },
            other => CliError::Cluster {
                message: other.to_string(),
                help: None,
            },
        }
    }
}

impl From<kube::Error> for CliError {
    fn from(err: kube::Error) -> Self {
        CliError::Cluster {
            message: err.to_string(),
            help: Some("check your kubeconfig and current context".to_string()),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
