//! Manifest value type
//!
//! A manifest is an untyped YAML tree. Only `kind`, `metadata.name` and
//! `metadata.namespace` are read by name; everything else is carried through
//! untouched so that unknown fields survive merging and rewriting.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

use crate::error::{CoreError, Result};

/// A Kubernetes resource manifest
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub Value);

impl Manifest {
    /// Parse a manifest from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(yaml)?;
        Ok(Self(value))
    }

    /// Load a manifest from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let value: Value =
            serde_yaml::from_str(&content).map_err(|source| CoreError::ManifestParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self(value))
    }

    /// Serialize to a YAML document
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.0)?)
    }

    /// The declared `kind`
    pub fn kind(&self) -> Option<&str> {
        self.0.get("kind").and_then(Value::as_str)
    }

    /// The declared `metadata.name`
    pub fn name(&self) -> Option<&str> {
        self.get("metadata.name").and_then(Value::as_str)
    }

    /// The declared `metadata.namespace`, if any
    pub fn namespace(&self) -> Option<&str> {
        self.get("metadata.namespace").and_then(Value::as_str)
    }

    /// The declared `kind`, or an error naming the missing field
    pub fn require_kind(&self) -> Result<&str> {
        self.kind().ok_or_else(|| CoreError::MissingField {
            field: "kind".to_string(),
        })
    }

    /// The declared `metadata.name`, or an error naming the missing field
    pub fn require_name(&self) -> Result<&str> {
        self.name().ok_or_else(|| CoreError::MissingField {
            field: "metadata.name".to_string(),
        })
    }

    /// Get a value by dotted path (e.g. `spec.template.spec`)
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.0, |node, segment| node.get(segment))
    }

    /// Get the inner YAML value
    pub fn inner(&self) -> &Value {
        &self.0
    }

    /// Get the inner YAML value mutably
    pub fn inner_mut(&mut self) -> &mut Value {
        &mut self.0
    }
}

impl From<Value> for Manifest {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Build a YAML mapping key
pub(crate) fn key(name: &str) -> Value {
    Value::String(name.to_string())
}
