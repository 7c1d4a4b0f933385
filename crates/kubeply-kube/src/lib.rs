//! Kubeply Kube - cluster integration for kubeply
//!
//! This crate provides:
//! - **Bridges**: the [`ClusterBridge`] contract over `kubectl`, the Kubernetes API, or an in-memory mock
//! - **Strategies**: one apply strategy per deployment class, selected by kind
//! - **Completion**: polling of one-off Jobs and Pods until they succeed or fail
//! - **Cleanup**: created workloads are deleted once monitoring ends
//! - **Deployer**: `apply_all`, `apply_named` and `get_merged` over a layered manifest set

pub mod bridge;
pub mod completion;
pub mod deployer;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod strategy;

pub use bridge::{
    ApiError, BridgeCall, ClusterBridge, KubeApiBridge, KubectlBridge, MockBridge, PodLogs,
};
pub use completion::{CompletionMonitor, MonitorState, POLL_INTERVAL};
pub use deployer::{ApplyProgress, ApplySummary, Deployer};
pub use dispatch::Dispatcher;
pub use error::{ConfigurationError, ErrorCategory, KubeError, Result, WorkloadFailure};
pub use guard::WorkloadGuard;
pub use strategy::{
    ApplyContext, ApplyOutcome, ApplyStrategy, ControllerApply, CronJobApply, DirectApply, RunJob,
    RunPod, standard_strategies,
};
