//! Options shared by every subcommand

use clap::{Args, ValueEnum};
use kubeply_core::{ApplyOptions, DEFAULT_BUILD_TAG, LayeredSet, parse_key_value_pairs};
use kubeply_kube::{ClusterBridge, KubeApiBridge, KubectlBridge};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;

/// How cluster calls are made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Backend {
    /// Shell out to kubectl
    #[default]
    Kubectl,
    /// Talk to the API server directly
    Api,
}

/// Format of rendered documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    /// Manifest directory; repeat to stack overlays, later ones win
    #[arg(short = 'd', long = "directory", default_value = ".")]
    pub directories: Vec<PathBuf>,

    /// Tag appended to untagged container images
    #[arg(short = 't', long, env = "KUBEPLY_BUILD_TAG", default_value = DEFAULT_BUILD_TAG)]
    pub build_tag: String,

    /// Label added to each resource (key=value)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Label added to each pod template (key=value)
    #[arg(long = "label-pod")]
    pub pod_labels: Vec<String>,

    /// Annotation added to each resource (key=value)
    #[arg(long = "annotate")]
    pub annotations: Vec<String>,

    /// Annotation added to each pod template (key=value)
    #[arg(long = "annotate-pod")]
    pub pod_annotations: Vec<String>,

    /// Host path volume added to each pod (name=path)
    #[arg(long = "host-volume")]
    pub host_volumes: Vec<String>,

    /// Environment variable set on every container (NAME=value)
    #[arg(short = 'e', long = "env")]
    pub environment: Vec<String>,

    /// Delete and recreate Deployments, StatefulSets and CronJobs
    #[arg(long)]
    pub replace: bool,

    /// Failed job pods tolerated before a job counts as failed
    #[arg(long, env = "KUBEPLY_MAX_JOB_RETRIES", default_value_t = 0)]
    pub max_job_retries: u32,

    /// Cluster backend
    #[arg(long, value_enum, env = "KUBEPLY_BACKEND", default_value_t = Backend::Kubectl)]
    pub backend: Backend,

    /// kubectl binary to run
    #[arg(long, value_name = "PATH")]
    pub kubectl: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Print rendered documents instead of applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Format of rendered documents
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub output: OutputFormat,
}

impl DeployArgs {
    /// Parse the key=value flags into apply options
    pub fn apply_options(&self) -> Result<ApplyOptions> {
        Ok(ApplyOptions {
            build_tag: self.build_tag.clone(),
            labels: parse_key_value_pairs(&self.labels)?,
            pod_labels: parse_key_value_pairs(&self.pod_labels)?,
            annotations: parse_key_value_pairs(&self.annotations)?,
            pod_annotations: parse_key_value_pairs(&self.pod_annotations)?,
            host_volumes: parse_key_value_pairs(&self.host_volumes)?,
            environment: parse_key_value_pairs(&self.environment)?,
            replace: self.replace,
            max_job_retries: self.max_job_retries,
        })
    }

    /// The directory layers, in override order
    pub fn manifest_set(&self) -> LayeredSet {
        LayeredSet::from_directories(self.directories.iter().cloned())
    }

    /// A kubectl bridge that is never invoked, for rendering only
    pub fn offline_bridge(&self) -> Arc<dyn ClusterBridge> {
        Arc::new(self.kubectl_bridge())
    }

    /// Connect the selected backend
    pub async fn bridge(&self) -> Result<Arc<dyn ClusterBridge>> {
        match self.backend {
            Backend::Kubectl => Ok(Arc::new(self.kubectl_bridge())),
            Backend::Api => {
                let bridge = KubeApiBridge::connect(self.context.as_deref()).await?;
                Ok(Arc::new(bridge))
            }
        }
    }

    fn kubectl_bridge(&self) -> KubectlBridge {
        let mut bridge = KubectlBridge::new();
        if let Some(program) = &self.kubectl {
            bridge = bridge.with_program(program.clone());
        }
        if let Some(context) = &self.context {
            bridge = bridge.with_context(context.clone());
        }
        bridge
    }
}
