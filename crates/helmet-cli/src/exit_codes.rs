//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions where applicable.

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - malformed bundle, manifest or arguments
pub const VALIDATION_ERROR: i32 = 2;

/// Release id missing from the whitelist
pub const NOT_WHITELISTED: i32 = 3;

/// Version resolution or chart download failed
pub const FETCH_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Kubernetes API or helm invocation failed
pub const CLUSTER_ERROR: i32 = 6;
