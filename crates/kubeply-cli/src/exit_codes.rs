//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - every manifest applied
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - unknown kind, bad restart policy, missing manifest
pub const CONFIGURATION_ERROR: i32 = 2;

/// Workload failure - a Job or Pod ran and failed
pub const WORKLOAD_ERROR: i32 = 3;

/// Cluster error - kubectl or the API server rejected a call
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
