//! High-level deployment driver
//!
//! A [`Deployer`] ties a manifest source, a cluster bridge and a set of
//! options together. Manifests are always handled one at a time, in order.

use kubeply_core::{ApplyOptions, Manifest, ManifestSource};
use std::sync::Arc;

use crate::bridge::ClusterBridge;
use crate::dispatch::Dispatcher;
use crate::error::{KubeError, Result};
use crate::strategy::{ApplyContext, ApplyOutcome};

/// Per-manifest outcomes of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    /// Manifest name and outcome, in apply order
    pub entries: Vec<(String, ApplyOutcome)>,
}

impl ApplySummary {
    pub fn push(&mut self, name: impl Into<String>, outcome: ApplyOutcome) {
        self.entries.push((name.into(), outcome));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names skipped because their custom resource is not installed
    pub fn skipped(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, outcome)| matches!(outcome, ApplyOutcome::SkippedMissingCrd { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Format as human-readable summary
    pub fn summary(&self) -> String {
        let count = |wanted: fn(&ApplyOutcome) -> bool| {
            self.entries
                .iter()
                .filter(|(_, outcome)| wanted(outcome))
                .count()
        };

        let parts: Vec<String> = [
            (count(|o| *o == ApplyOutcome::Applied), "applied"),
            (count(|o| *o == ApplyOutcome::Replaced), "replaced"),
            (count(|o| *o == ApplyOutcome::Completed), "completed"),
            (
                count(|o| matches!(o, ApplyOutcome::SkippedMissingCrd { .. })),
                "skipped",
            ),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

        if parts.is_empty() {
            "No manifests processed".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Hooks called around each manifest of a multi-manifest run
pub trait ApplyProgress {
    /// `name` is about to be applied
    fn started(&mut self, _name: &str) {}

    /// `name` was applied
    fn finished(&mut self, _name: &str, _outcome: &ApplyOutcome) {}

    /// `name` failed and the run stops
    fn failed(&mut self, _name: &str, _error: &KubeError) {}
}

impl ApplyProgress for () {}

/// Applies named manifests from a layered set to a cluster
pub struct Deployer {
    manifests: Box<dyn ManifestSource>,
    bridge: Arc<dyn ClusterBridge>,
    options: ApplyOptions,
    dispatcher: Dispatcher,
}

impl Deployer {
    /// Create a deployer over the standard strategies
    pub fn new(
        manifests: impl ManifestSource + 'static,
        bridge: Arc<dyn ClusterBridge>,
        options: ApplyOptions,
    ) -> Result<Self> {
        Ok(Self {
            manifests: Box::new(manifests),
            bridge,
            options,
            dispatcher: Dispatcher::standard()?,
        })
    }

    /// Every manifest name, in natural order
    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.manifests.names()?)
    }

    /// The merged and rendered document that would be submitted for `name`
    pub fn get_merged(&self, name: &str) -> Result<Manifest> {
        let manifest = self.manifests.lookup(name)?;
        let strategy = self.dispatcher.strategy_for(&manifest)?;
        strategy.render(&manifest, &self.options)
    }

    /// Apply one manifest and wait for whatever its strategy waits for
    pub async fn apply_named(&self, name: &str) -> Result<ApplyOutcome> {
        let manifest = self.manifests.lookup(name)?;
        let strategy = self.dispatcher.strategy_for(&manifest)?;
        tracing::info!(name, strategy = strategy.name(), "applying");

        let ctx = ApplyContext {
            bridge: self.bridge.as_ref(),
            options: &self.options,
        };
        strategy.apply(&manifest, ctx).await
    }

    /// Apply every manifest in natural order, stopping at the first error
    pub async fn apply_all(&self) -> Result<ApplySummary> {
        self.apply_all_with(&mut ()).await
    }

    /// [`Deployer::apply_all`], reporting each manifest to `progress`
    pub async fn apply_all_with<P: ApplyProgress>(
        &self,
        progress: &mut P,
    ) -> Result<ApplySummary> {
        let names = self.names()?;
        self.apply_each(&names, progress).await
    }

    /// Apply `names` in the given order, stopping at the first error
    pub async fn apply_each<P: ApplyProgress>(
        &self,
        names: &[String],
        progress: &mut P,
    ) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();
        for name in names {
            progress.started(name);
            match self.apply_named(name).await {
                Ok(outcome) => {
                    progress.finished(name, &outcome);
                    summary.push(name.clone(), outcome);
                }
                Err(e) => {
                    progress.failed(name, &e);
                    return Err(e);
                }
            }
        }
        Ok(summary)
    }
}

impl std::fmt::Debug for Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deployer")
            .field("options", &self.options)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
