//! Run-to-completion monitoring for Jobs and bare Pods
//!
//! The monitor polls the workload's status once per [`POLL_INTERVAL`] until
//! it succeeds or fails. There is no internal timeout.
//!
//! ```text
//! Created ──poll──▶ Polling ──▶ Succeeded
//!                      │
//!                      ├──workload failure──▶ Failed
//!                      └──any other error───▶ Aborted
//! ```

use serde::Deserialize;
use serde_yaml::Value;
use std::time::Duration;

use crate::bridge::ClusterBridge;
use crate::error::{KubeError, Result, WorkloadFailure};

/// Spacing between two status polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where a monitored workload stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Submitted, not yet polled
    Created,
    /// At least one poll done, not terminal
    Polling,
    Succeeded,
    /// The workload itself failed
    Failed,
    /// Monitoring stopped on an error unrelated to the workload's outcome
    Aborted,
}

/// The kind of workload being watched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Workload {
    Job { max_retries: u32 },
    Pod,
}

impl Workload {
    fn kind(&self) -> &'static str {
        match self {
            Workload::Job { .. } => "Job",
            Workload::Pod => "Pod",
        }
    }
}

/// Polls one workload until it reaches a terminal state
pub struct CompletionMonitor<'a> {
    bridge: &'a dyn ClusterBridge,
    workload: Workload,
    name: String,
    namespace: Option<String>,
    state: MonitorState,
    polls: u32,
}

impl<'a> CompletionMonitor<'a> {
    /// Watch a Job, failing once more than `max_retries` pods have failed
    pub fn for_job(
        bridge: &'a dyn ClusterBridge,
        name: impl Into<String>,
        namespace: Option<&str>,
        max_retries: u32,
    ) -> Self {
        Self::new(bridge, Workload::Job { max_retries }, name, namespace)
    }

    /// Watch a bare Pod
    pub fn for_pod(
        bridge: &'a dyn ClusterBridge,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self::new(bridge, Workload::Pod, name, namespace)
    }

    fn new(
        bridge: &'a dyn ClusterBridge,
        workload: Workload,
        name: impl Into<String>,
        namespace: Option<&str>,
    ) -> Self {
        Self {
            bridge,
            workload,
            name: name.into(),
            namespace: namespace.map(str::to_string),
            state: MonitorState::Created,
            polls: 0,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// Number of status reads performed
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Poll until the workload succeeds or fails
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if self.poll_once().await? {
                return Ok(());
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Read the status once. `Ok(true)` means the workload succeeded.
    pub async fn poll_once(&mut self) -> Result<bool> {
        self.state = MonitorState::Polling;
        self.polls += 1;

        match self.evaluate().await {
            Ok(true) => {
                self.state = MonitorState::Succeeded;
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => {
                self.state = match e {
                    KubeError::Workload(_) => MonitorState::Failed,
                    _ => MonitorState::Aborted,
                };
                Err(e)
            }
        }
    }

    async fn evaluate(&self) -> Result<bool> {
        let object = self
            .bridge
            .get(
                self.workload.kind(),
                Some(&self.name),
                self.namespace.as_deref(),
            )
            .await?;
        let status = object.get("status").cloned().unwrap_or(Value::Null);
        tracing::debug!(
            kind = self.workload.kind(),
            name = %self.name,
            poll = self.polls,
            "polled status"
        );

        match self.workload {
            Workload::Job { max_retries } => {
                let status: JobStatus = self.parse_status(status)?;
                self.evaluate_job(&status, max_retries).await
            }
            Workload::Pod => {
                let status: PodStatus = self.parse_status(status)?;
                self.evaluate_pod(&status).await
            }
        }
    }

    fn parse_status<T: for<'de> Deserialize<'de> + Default>(&self, status: Value) -> Result<T> {
        if status.is_null() {
            return Ok(T::default());
        }
        serde_yaml::from_value(status).map_err(|e| KubeError::MalformedStatus {
            kind: self.workload.kind().to_string(),
            name: self.name.clone(),
            message: e.to_string(),
        })
    }

    async fn evaluate_job(&self, status: &JobStatus, max_retries: u32) -> Result<bool> {
        if let Some(condition) = status.conditions.first()
            && condition.type_ == "Failed"
        {
            let message = condition.message.clone().unwrap_or_default();
            let failure = if condition.reason.as_deref() == Some("DeadlineExceeded") {
                WorkloadFailure::DeadlineExceeded {
                    job: self.name.clone(),
                    message,
                }
            } else {
                WorkloadFailure::JobFailed {
                    job: self.name.clone(),
                    message,
                    diagnostics: None,
                }
            };
            return Err(failure.into());
        }

        if status.failed > max_retries {
            let diagnostics = self.job_diagnostics().await;
            return Err(WorkloadFailure::JobFailed {
                job: self.name.clone(),
                message: format!("Job failed {} times.", status.failed),
                diagnostics,
            }
            .into());
        }

        Ok(status.completion_time.is_some())
    }

    /// Best-effort explanation taken from one failed pod of the job
    async fn job_diagnostics(&self) -> Option<String> {
        let pods = match self
            .bridge
            .get_failed_pods(&self.name, self.namespace.as_deref())
            .await
        {
            Ok(pods) => pods,
            Err(e) => {
                tracing::warn!(job = %self.name, error = %e, "could not list failed pods");
                return None;
            }
        };

        let Some(first) = pods.first() else {
            tracing::warn!(job = %self.name, "No pod found for job");
            return None;
        };
        if pods.len() > 1 {
            tracing::info!(
                job = %self.name,
                count = pods.len(),
                "More than one failed pod found for job, using first"
            );
        }

        let pod: FailedPod = match serde_yaml::from_value(first.clone()) {
            Ok(pod) => pod,
            Err(e) => {
                tracing::warn!(job = %self.name, error = %e, "unreadable failed pod");
                return None;
            }
        };

        if let Some(message) = cannot_run_message(&pod.status.init_container_statuses) {
            return Some(format!("Init container failed! {}", message));
        }
        if let Some(message) = cannot_run_message(&pod.status.container_statuses) {
            return Some(format!("Container failed! {}", message));
        }

        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .or(self.namespace.as_deref());
        match self.bridge.logs(&pod.metadata.name, None, namespace).await {
            Ok(logs) => Some(logs.stdout),
            Err(e) => {
                tracing::warn!(
                    pod = %pod.metadata.name,
                    error = %e,
                    "could not fetch failed pod logs"
                );
                None
            }
        }
    }

    async fn evaluate_pod(&self, status: &PodStatus) -> Result<bool> {
        for container in &status.container_statuses {
            if let Some(terminated) = &container.state.terminated
                && !terminated.is_completed()
            {
                return Err(self.container_failure(&container.name).await.into());
            }
        }

        Ok(!status.container_statuses.is_empty()
            && status.container_statuses.iter().all(|container| {
                container
                    .state
                    .terminated
                    .as_ref()
                    .is_some_and(Terminated::is_completed)
            }))
    }

    async fn container_failure(&self, container: &str) -> WorkloadFailure {
        let logs = self
            .bridge
            .logs(&self.name, Some(container), self.namespace.as_deref())
            .await;
        let (stdout, stderr) = match logs {
            Ok(logs) => (logs.stdout, logs.stderr),
            Err(e) => {
                tracing::warn!(
                    pod = %self.name,
                    container,
                    error = %e,
                    "could not fetch container logs"
                );
                (String::new(), e.to_string())
            }
        };

        WorkloadFailure::ContainerFailed {
            pod: self.name.clone(),
            container: container.to_string(),
            stdout,
            stderr,
        }
    }
}

fn cannot_run_message(statuses: &[ContainerStatus]) -> Option<String> {
    statuses.iter().find_map(|status| {
        status
            .state
            .terminated
            .as_ref()
            .filter(|t| t.reason.as_deref() == Some("ContainerCannotRun"))
            .map(|t| t.message.clone().unwrap_or_default())
    })
}

// Lenient views over the status subtree; absent fields take their defaults.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct JobStatus {
    conditions: Vec<JobCondition>,
    failed: u32,
    completion_time: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JobCondition {
    #[serde(rename = "type")]
    type_: String,
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PodStatus {
    init_container_statuses: Vec<ContainerStatus>,
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerStatus {
    name: String,
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContainerState {
    terminated: Option<Terminated>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Terminated {
    reason: Option<String>,
    message: Option<String>,
}

impl Terminated {
    fn is_completed(&self) -> bool {
        self.reason.as_deref() == Some("Completed")
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FailedPod {
    metadata: PodMetadata,
    status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PodMetadata {
    name: String,
    namespace: Option<String>,
}
