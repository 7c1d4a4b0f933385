//! Error types for kubeply-kube

use kubeply_core::CoreError;
use thiserror::Error;

use crate::bridge::ApiError;

/// Result type for kubeply-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while deploying manifests
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Manifest set or dispatch configuration is wrong; never retried
    #[error(transparent)]
    Config(#[from] ConfigurationError),

    /// A run-to-completion workload did not succeed
    #[error(transparent)]
    Workload(#[from] WorkloadFailure),

    /// A cluster command failed
    #[error(transparent)]
    Bridge(#[from] ApiError),

    /// Manifest handling error
    #[error("{0}")]
    Core(CoreError),

    /// Kubernetes client setup error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Workload status did not have the expected shape
    #[error("malformed status for {kind} '{name}': {message}")]
    MalformedStatus {
        kind: String,
        name: String,
        message: String,
    },
}

/// Fatal configuration problems, surfaced before anything is submitted
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Unknown resource kind: {kind}")]
    UnknownKind { kind: String },

    #[error("kind '{kind}' is claimed by more than one apply strategy")]
    DuplicateKind { kind: String },

    #[error("no apply strategy registered for kind '{kind}'")]
    UnhandledKind { kind: String },

    #[error("kind '{kind}' does not carry a pod template")]
    NotPodBearing { kind: String },

    #[error("Pod '{pod}' has to have restartPolicy = Never (found {})", policy.as_deref().unwrap_or("none"))]
    InvalidRestartPolicy { pod: String, policy: Option<String> },

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Terminal failure of a job or bare pod
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadFailure {
    /// The job failed, or exhausted its retry budget
    #[error("job '{job}' failed: {message}")]
    JobFailed {
        job: String,
        message: String,
        /// Output recovered from a failed pod of the job, when one was found
        diagnostics: Option<String>,
    },

    /// The job ran past `activeDeadlineSeconds`
    #[error("job '{job}' exceeded its deadline: {message}")]
    DeadlineExceeded { job: String, message: String },

    /// A container terminated with a reason other than `Completed`
    #[error("Failure in {container} (pod '{pod}')")]
    ContainerFailed {
        pod: String,
        container: String,
        stdout: String,
        stderr: String,
    },
}

/// Coarse error class, used by callers to choose exit codes and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Workload,
    Bridge,
    Other,
}

impl From<CoreError> for KubeError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::UnknownKind { kind } => {
                KubeError::Config(ConfigurationError::UnknownKind { kind })
            }
            CoreError::NotPodBearing { kind } => {
                KubeError::Config(ConfigurationError::NotPodBearing { kind })
            }
            CoreError::MissingField { field } => KubeError::Config(
                ConfigurationError::InvalidManifest(format!("missing required field '{field}'")),
            ),
            CoreError::InvalidManifest { message } => {
                KubeError::Config(ConfigurationError::InvalidManifest(message))
            }
            other => KubeError::Core(other),
        }
    }
}

impl KubeError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            KubeError::Config(_) => ErrorCategory::Configuration,
            KubeError::Workload(_) => ErrorCategory::Workload,
            KubeError::Bridge(_) | KubeError::Api(_) => ErrorCategory::Bridge,
            KubeError::Core(_) | KubeError::MalformedStatus { .. } => ErrorCategory::Other,
        }
    }

    /// The workload failure, if this is one
    pub fn as_workload_failure(&self) -> Option<&WorkloadFailure> {
        match self {
            KubeError::Workload(failure) => Some(failure),
            _ => None,
        }
    }
}
