//! Cleanup of created run-to-completion workloads
//!
//! A [`WorkloadGuard`] owns a workload that has just been created. Running
//! the monitoring future through [`WorkloadGuard::run`] deletes the workload
//! exactly once afterwards, whether the future succeeded, failed or panicked.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use crate::bridge::ClusterBridge;

/// Scoped ownership of a created Job or Pod
pub struct WorkloadGuard<'a> {
    bridge: &'a dyn ClusterBridge,
    kind: String,
    name: String,
    namespace: Option<String>,
}

impl<'a> WorkloadGuard<'a> {
    pub fn new(
        bridge: &'a dyn ClusterBridge,
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self {
            bridge,
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.map(str::to_string),
        }
    }

    /// Drive `work` to completion, then delete the workload.
    ///
    /// Deletion failures are logged and never replace the outcome of `work`.
    /// A panic inside `work` is resumed after deletion.
    pub async fn run<F, T>(self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let outcome = AssertUnwindSafe(work).catch_unwind().await;
        self.release().await;

        match outcome {
            Ok(value) => value,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn release(self) {
        tracing::debug!(kind = %self.kind, name = %self.name, "deleting workload");
        if let Err(e) = self
            .bridge
            .delete(&self.kind, &self.name, self.namespace.as_deref())
            .await
        {
            tracing::warn!(
                kind = %self.kind,
                name = %self.name,
                error = %e,
                "failed to delete workload"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeCall, MockBridge};

    fn delete_call() -> BridgeCall {
        BridgeCall::Delete {
            kind: "Job".to_string(),
            name: "migrate".to_string(),
            namespace: Some("backend".to_string()),
        }
    }

    #[tokio::test]
    async fn test_deletes_after_success() {
        let bridge = MockBridge::new();
        let guard = WorkloadGuard::new(&bridge, "Job", "migrate", Some("backend"));

        let value = guard.run(async { 42 }).await;

        assert_eq!(value, 42);
        assert_eq!(bridge.calls(), vec![delete_call()]);
    }

    #[tokio::test]
    async fn test_deletes_after_failure() {
        let bridge = MockBridge::new();
        let guard = WorkloadGuard::new(&bridge, "Job", "migrate", Some("backend"));

        let result: Result<(), &str> = guard.run(async { Err("job failed") }).await;

        assert_eq!(result, Err("job failed"));
        assert_eq!(bridge.count("delete"), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_does_not_mask_outcome() {
        let bridge = MockBridge::new().fail_next("delete", "jobs.batch \"migrate\" not found");
        let guard = WorkloadGuard::new(&bridge, "Job", "migrate", Some("backend"));

        let result: Result<u8, &str> = guard.run(async { Err("container failed") }).await;

        assert_eq!(result, Err("container failed"));
        assert_eq!(bridge.count("delete"), 1);
    }

    #[tokio::test]
    async fn test_deletes_then_resumes_panic() {
        let bridge = MockBridge::new();
        let guard = WorkloadGuard::new(&bridge, "Job", "migrate", Some("backend"));

        let exploding = async {
            if bridge.count("delete") == 0 {
                panic!("poll loop exploded");
            }
            7
        };
        let outcome = AssertUnwindSafe(guard.run(exploding)).catch_unwind().await;

        assert!(outcome.is_err());
        assert_eq!(bridge.calls(), vec![delete_call()]);
    }
}
