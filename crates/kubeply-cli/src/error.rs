//! CLI error types with exit code handling
//!
//! Every library error is folded into a [`CliError`] whose variant decides
//! the process exit code.

use kubeply_core::CoreError;
use kubeply_kube::{ErrorCategory, KubeError, WorkloadFailure};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Bad manifests or kinds the driver cannot deploy
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kubeply::cli::configuration))]
    Configuration {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A Job or Pod ran and failed
    #[error("{failure}")]
    #[diagnostic(code(kubeply::cli::workload))]
    Workload { failure: WorkloadFailure },

    /// kubectl or the API server rejected a call
    #[error("Cluster error: {message}")]
    #[diagnostic(
        code(kubeply::cli::cluster),
        help("check the current kubectl context and cluster access")
    )]
    Cluster { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kubeply::cli::io))]
    Io { message: String },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(kubeply::cli::usage))]
    Usage { message: String },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(kubeply::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration { .. } => exit_codes::CONFIGURATION_ERROR,
            CliError::Workload { .. } => exit_codes::WORKLOAD_ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }

    /// Create a configuration error with help text
    pub fn configuration_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// The workload failure behind this error, if any
    pub fn workload_failure(&self) -> Option<&WorkloadFailure> {
        match self {
            CliError::Workload { failure } => Some(failure),
            _ => None,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidOption { message } => CliError::Usage { message },
            CoreError::ManifestNotFound { ref name } => CliError::configuration_with_help(
                err.to_string(),
                format!("add {name}.yml to one of the --directory layers"),
            ),
            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            other => CliError::configuration(other.to_string()),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::Workload(failure) => CliError::Workload { failure },
            KubeError::Core(core) => core.into(),
            other => match other.category() {
                ErrorCategory::Configuration => CliError::configuration(other.to_string()),
                ErrorCategory::Bridge => CliError::Cluster {
                    message: other.to_string(),
                },
                _ => CliError::Other {
                    message: other.to_string(),
                },
            },
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Other {
            message: format!("JSON rendering failed: {err}"),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
