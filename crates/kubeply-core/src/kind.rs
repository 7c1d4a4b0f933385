//! Resource kind taxonomy
//!
//! Every manifest kind kubeply can deploy maps to exactly one variant here.
//! Anything else is rejected up front as a configuration error.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Supported resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Service,
    Secret,
    ConfigMap,
    StorageClass,
    PersistentVolume,
    PersistentVolumeClaim,
    Ingress,
    PodDisruptionBudget,
    /// Prometheus operator custom resources
    ServiceMonitor,
    PodMonitor,
    PrometheusRule,
    AlertmanagerConfig,

    Deployment,
    StatefulSet,
    CronJob,

    Job,
    Pod,
}


impl ResourceKind {
    /// Every supported kind
    pub const ALL: [ResourceKind; 17] = [
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
        ResourceKind::Deployment,
        ResourceKind::StatefulSet,
        ResourceKind::CronJob,
        ResourceKind::Job,
        ResourceKind::Pod,
    ];

    /// The kind name as written in manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Service => "Service",
            ResourceKind::Secret => "Secret",
            ResourceKind::ConfigMap => "ConfigMap",
            ResourceKind::StorageClass => "StorageClass",
            ResourceKind::PersistentVolume => "PersistentVolume",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::PodDisruptionBudget => "PodDisruptionBudget",
            ResourceKind::ServiceMonitor => "ServiceMonitor",
            ResourceKind::PodMonitor => "PodMonitor",
            ResourceKind::PrometheusRule => "PrometheusRule",
            ResourceKind::AlertmanagerConfig => "AlertmanagerConfig",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::CronJob => "CronJob",
            ResourceKind::Job => "Job",
            ResourceKind::Pod => "Pod",
        }
    }

    /// Whether this kind is defined by a custom resource definition that
    /// may not be installed in the target cluster
    pub fn is_custom_resource(&self) -> bool {
        matches!(
            self,
            ResourceKind::ServiceMonitor
                | ResourceKind::PodMonitor
                | ResourceKind::PrometheusRule
                | ResourceKind::AlertmanagerConfig
        )
    }

}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind {
                kind: s.to_string(),
            })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
