//! Apply strategies, one per deployment class
//!
//! | strategy | kinds | behaviour |
//! |----------|-------|-----------|
//! | [`DirectApply`] | apply-only kinds | apply verbatim, skip missing custom resources |
//! | [`ControllerApply`] | Deployment, StatefulSet | rewrite, then replace or apply |
//! | [`CronJobApply`] | CronJob | rewrite, then replace or apply |
//! | [`RunJob`] | Job | rewrite, create, wait, delete |
//! | [`RunPod`] | Pod | check restart policy, rewrite, create, wait, delete |

use async_trait::async_trait;
use kubeply_core::{ApplyOptions, Manifest, ResourceKind, transform_pod_manifest};

use crate::bridge::ClusterBridge;
use crate::completion::CompletionMonitor;
use crate::error::{ConfigurationError, KubeError, Result};
use crate::guard::WorkloadGuard;

/// What applying one manifest did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Created or updated in place
    Applied,
    /// Deleted and recreated
    Replaced,
    /// Ran to completion and was cleaned up
    Completed,
    /// The custom resource definition for `kind` is not installed
    SkippedMissingCrd { kind: String },
}

/// Everything a strategy needs besides the manifest
#[derive(Clone, Copy)]
pub struct ApplyContext<'a> {
    pub bridge: &'a dyn ClusterBridge,
    pub options: &'a ApplyOptions,
}

/// Deploys the manifests of a fixed set of kinds
#[async_trait]
pub trait ApplyStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Kinds this strategy handles
    fn kinds(&self) -> &'static [ResourceKind];

    /// The document that would be submitted for `manifest`
    fn render(&self, manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest>;

    /// Submit `manifest` and wait for whatever the strategy waits for
    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome>;
}

/// The five standard strategies
pub fn standard_strategies() -> Vec<Box<dyn ApplyStrategy>> {
    vec![
        Box::new(DirectApply),
        Box::new(ControllerApply),
        Box::new(CronJobApply),
        Box::new(RunJob),
        Box::new(RunPod),
    ]
}

/// Plain resources without a pod template
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectApply;

#[async_trait]
impl ApplyStrategy for DirectApply {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn kinds(&self) -> &'static [ResourceKind] {
        &[
            ResourceKind::Service,
            ResourceKind::Secret,
            ResourceKind::ConfigMap,
            ResourceKind::StorageClass,
            ResourceKind::PersistentVolume,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Ingress,
            ResourceKind::PodDisruptionBudget,
            ResourceKind::ServiceMonitor,
            ResourceKind::PodMonitor,
            ResourceKind::PrometheusRule,
            ResourceKind::AlertmanagerConfig,
        ]
    }

    fn render(&self, manifest: &Manifest, _options: &ApplyOptions) -> Result<Manifest> {
        Ok(manifest.clone())
    }

    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
        match ctx.bridge.apply(manifest, manifest.namespace()).await {
            Ok(()) => Ok(ApplyOutcome::Applied),
            Err(e) => {
                let missing = ResourceKind::ALL
                    .into_iter()
                    .filter(ResourceKind::is_custom_resource)
                    .find(|kind| e.is_no_matches_for_kind(kind.as_str()));
                match missing {
                    Some(kind) => {
                        tracing::warn!(
                            "Custom Resource named \"{}\" not found! Please install it first, skipping for now.",
                            kind
                        );
                        Ok(ApplyOutcome::SkippedMissingCrd {
                            kind: kind.to_string(),
                        })
                    }
                    None => Err(e.into()),
                }
            }
        }
    }
}

/// Long-running controllers with a pod template
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerApply;

#[async_trait]
impl ApplyStrategy for ControllerApply {
    fn name(&self) -> &'static str {
        "controller"
    }

    fn kinds(&self) -> &'static [ResourceKind] {
        &[ResourceKind::Deployment, ResourceKind::StatefulSet]
    }

    fn render(&self, manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest> {
        Ok(transform_pod_manifest(manifest, options)?)
    }

    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
        let rendered = self.render(manifest, ctx.options)?;
        replace_or_apply(&rendered, ctx).await
    }
}

/// Scheduled jobs
#[derive(Debug, Clone, Copy, Default)]
pub struct CronJobApply;

#[async_trait]
impl ApplyStrategy for CronJobApply {
    fn name(&self) -> &'static str {
        "cronjob"
    }

    fn kinds(&self) -> &'static [ResourceKind] {
        &[ResourceKind::CronJob]
    }

    fn render(&self, manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest> {
        Ok(transform_pod_manifest(manifest, options)?)
    }

    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
        let rendered = self.render(manifest, ctx.options)?;
        replace_or_apply(&rendered, ctx).await
    }
}

async fn replace_or_apply(rendered: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
    if ctx.options.replace {
        ctx.bridge.replace(rendered, rendered.namespace()).await?;
        Ok(ApplyOutcome::Replaced)
    } else {
        ctx.bridge.apply(rendered, rendered.namespace()).await?;
        Ok(ApplyOutcome::Applied)
    }
}

/// One-off Jobs, polled until they finish
#[derive(Debug, Clone, Copy, Default)]
pub struct RunJob;

#[async_trait]
impl ApplyStrategy for RunJob {
    fn name(&self) -> &'static str {
        "job"
    }

    fn kinds(&self) -> &'static [ResourceKind] {
        &[ResourceKind::Job]
    }

    fn render(&self, manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest> {
        Ok(transform_pod_manifest(manifest, options)?)
    }

    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
        let rendered = self.render(manifest, ctx.options)?;
        let name = rendered.require_name()?;
        let monitor = CompletionMonitor::for_job(
            ctx.bridge,
            name,
            rendered.namespace(),
            ctx.options.max_job_retries,
        );
        create_and_wait(ResourceKind::Job, &rendered, monitor, ctx).await
    }
}

/// Bare Pods that must not restart, polled until they finish
#[derive(Debug, Clone, Copy, Default)]
pub struct RunPod;

impl RunPod {
    fn check_restart_policy(manifest: &Manifest) -> Result<()> {
        let policy = manifest.get("spec.restartPolicy").and_then(|v| v.as_str());
        if policy == Some("Never") {
            return Ok(());
        }
        Err(ConfigurationError::InvalidRestartPolicy {
            pod: manifest.name().unwrap_or_default().to_string(),
            policy: policy.map(str::to_string),
        }
        .into())
    }
}

#[async_trait]
impl ApplyStrategy for RunPod {
    fn name(&self) -> &'static str {
        "pod"
    }

    fn kinds(&self) -> &'static [ResourceKind] {
        &[ResourceKind::Pod]
    }

    fn render(&self, manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest> {
        Ok(transform_pod_manifest(manifest, options)?)
    }

    async fn apply(&self, manifest: &Manifest, ctx: ApplyContext<'_>) -> Result<ApplyOutcome> {
        Self::check_restart_policy(manifest)?;
        let rendered = self.render(manifest, ctx.options)?;
        let name = rendered.require_name()?;
        let monitor = CompletionMonitor::for_pod(ctx.bridge, name, rendered.namespace());
        create_and_wait(ResourceKind::Pod, &rendered, monitor, ctx).await
    }
}

/// Create the workload, then poll it under a guard that deletes it on exit
async fn create_and_wait(
    kind: ResourceKind,
    rendered: &Manifest,
    mut monitor: CompletionMonitor<'_>,
    ctx: ApplyContext<'_>,
) -> Result<ApplyOutcome> {
    let name = rendered.require_name()?;
    let namespace = rendered.namespace();

    ctx.bridge.create(rendered, namespace).await?;
    tracing::info!(%kind, name, "created, waiting for completion");

    let guard = WorkloadGuard::new(ctx.bridge, kind.as_str(), name, namespace);
    guard.run(monitor.run()).await?;

    Ok(ApplyOutcome::Completed)
}
