//! Cluster bridges
//!
//! Everything kubeply does to a cluster goes through [`ClusterBridge`]:
//! - **Kubectl**: shells out to `kubectl`, the default
//! - **Api**: talks to the API server through `kube::Client`
//! - **Mock**: in memory, scripted, for tests

mod api;
mod kubectl;
mod mock;

pub use api::KubeApiBridge;
pub use kubectl::KubectlBridge;
pub use mock::{BridgeCall, MockBridge};

use async_trait::async_trait;
use kubeply_core::Manifest;
use serde_yaml::Value;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Attempts made for read-only calls
pub const READ_ATTEMPTS: u32 = 3;

/// Pause between read attempts
pub const READ_BACKOFF: Duration = Duration::from_millis(500);

/// Result type for bridge calls
pub type BridgeResult<T> = std::result::Result<T, ApiError>;

/// A failed cluster command
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ApiError {
    /// The bridge operation (`create`, `get`, ...)
    pub operation: String,
    /// Captured diagnostic output
    pub message: String,
}

impl ApiError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the cluster rejected the manifest because `kind` is not installed
    pub fn is_no_matches_for_kind(&self, kind: &str) -> bool {
        self.message.contains(&format!("no matches for kind \"{kind}\""))
    }
}

/// Captured output of `logs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodLogs {
    pub stdout: String,
    pub stderr: String,
}

/// Primitive cluster operations
///
/// Implementations must be Send + Sync for use across async tasks.
/// `namespace` is `None` when the manifest does not declare one.
#[async_trait]
pub trait ClusterBridge: Send + Sync {
    /// Fetch one object, or a `{items: [...]}` list when `name` is `None`
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<Value>;

    /// Fetch the pods of a job that ended in phase `Failed`
    async fn get_failed_pods(
        &self,
        job_name: &str,
        namespace: Option<&str>,
    ) -> BridgeResult<Vec<Value>>;

    /// Fetch a pod's logs
    async fn logs(
        &self,
        pod: &str,
        container: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<PodLogs>;

    /// Create a new object
    async fn create(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()>;

    /// Create or update in place
    async fn apply(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()>;

    /// Delete and recreate
    async fn replace(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()>;

    /// Delete an object by kind and name
    async fn delete(&self, kind: &str, name: &str, namespace: Option<&str>) -> BridgeResult<()>;
}

/// Run an idempotent read, retrying transient failures
pub(crate) async fn with_read_retries<T, F, Fut>(operation: &str, mut read: F) -> BridgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<T>>,
{
    let mut attempt = 1;
    loop {
        match read().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < READ_ATTEMPTS => {
                tracing::warn!(
                    operation,
                    attempt,
                    error = %e.message,
                    "cluster read failed, retrying"
                );
                attempt += 1;
                tokio::time::sleep(READ_BACKOFF).await;
            }
            Err(e) => return Err(e),
        }
    }
}
