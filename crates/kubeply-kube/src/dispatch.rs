//! Kind to strategy dispatch
//!
//! The table is built once and validated: every kind must be claimed by
//! exactly one strategy.

use kubeply_core::{Manifest, ResourceKind};
use std::collections::HashMap;

use crate::error::{ConfigurationError, Result};
use crate::strategy::{ApplyStrategy, standard_strategies};

/// Resolves a manifest's kind to the strategy that deploys it
pub struct Dispatcher {
    strategies: Vec<Box<dyn ApplyStrategy>>,
    by_kind: HashMap<ResourceKind, usize>,
}

impl Dispatcher {
    /// Build a dispatch table, rejecting duplicate and missing kinds
    pub fn new(strategies: Vec<Box<dyn ApplyStrategy>>) -> Result<Self> {
        let mut by_kind = HashMap::new();

        for (index, strategy) in strategies.iter().enumerate() {
            for kind in strategy.kinds() {
                if by_kind.insert(*kind, index).is_some() {
                    return Err(ConfigurationError::DuplicateKind {
                        kind: kind.to_string(),
                    }
                    .into());
                }
            }
        }

        if let Some(kind) = ResourceKind::ALL
            .iter()
            .find(|kind| !by_kind.contains_key(*kind))
        {
            return Err(ConfigurationError::UnhandledKind {
                kind: kind.to_string(),
            }
            .into());
        }

        Ok(Self {
            strategies,
            by_kind,
        })
    }

    /// The table over the five standard strategies
    pub fn standard() -> Result<Self> {
        Self::new(standard_strategies())
    }

    /// Strategy for a kind
    pub fn strategy(&self, kind: ResourceKind) -> Result<&dyn ApplyStrategy> {
        self.by_kind
            .get(&kind)
            .map(|&index| self.strategies[index].as_ref())
            .ok_or_else(|| {
                ConfigurationError::UnhandledKind {
                    kind: kind.to_string(),
                }
                .into()
            })
    }

    /// Strategy for a manifest's declared kind
    pub fn strategy_for(&self, manifest: &Manifest) -> Result<&dyn ApplyStrategy> {
        let kind: ResourceKind = manifest.require_kind()?.parse()?;
        self.strategy(kind)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("Dispatcher")
            .field("strategies", &names)
            .finish()
    }
}
