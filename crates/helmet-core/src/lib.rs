//! Helmet Core - shared types for chart synchronization and bundle deployment
//!
//! This crate provides the foundational pieces used throughout Helmet:
//! - `digest`: canonical content digest of a directory tree
//! - `ChartMetadata`: a fetched chart's `Chart.yaml`
//! - `CompiledBundle`: the on-disk output of the compile step
//! - `archive`: extraction of chart archives
//! - `HelmetConfig`: tool-wide settings

pub mod archive;
pub mod bundle;
pub mod chart;
pub mod config;
pub mod digest;
pub mod error;

pub use archive::ArchiveFormat;
pub use bundle::{BundleMeta, CompiledBundle, SubReleaseKind};
pub use chart::ChartMetadata;
pub use config::HelmetConfig;
pub use digest::digest_dir;
pub use error::{CoreError, Result};
