//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid chart at {path}: {message}")]
    InvalidChart { path: String, message: String },

    #[error("Invalid compiled bundle at {path}: {message}")]
    InvalidBundle { path: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Archive entry escapes the destination directory: {entry}")]
    UnsafeArchivePath { entry: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<zip::result::ZipError> for CoreError {
    fn from(e: zip::result::ZipError) -> Self {
        CoreError::Archive {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
