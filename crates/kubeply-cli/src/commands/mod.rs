//! CLI commands

pub mod apply;
pub mod show;

use kubeply_kube::{ClusterBridge, Deployer};
use std::sync::Arc;

use crate::args::DeployArgs;
use crate::error::Result;

/// Deployer over the directory layers and options given on the command line
pub fn deployer(args: &DeployArgs, bridge: Arc<dyn ClusterBridge>) -> Result<Deployer> {
    Ok(Deployer::new(
        args.manifest_set(),
        bridge,
        args.apply_options()?,
    )?)
}
