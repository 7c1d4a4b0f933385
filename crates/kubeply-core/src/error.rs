//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("manifest '{name}' not found in any layer")]
    ManifestNotFound { name: String },

    #[error("Unknown resource kind: {kind}")]
    UnknownKind { kind: String },

    #[error("kind '{kind}' does not carry a pod template")]
    NotPodBearing { kind: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Invalid option: {message}")]
    InvalidOption { message: String },

    #[error("Failed to parse {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read directory: {0}")]
    Walk(#[from] walkdir::Error),
}

impl CoreError {
    /// Whether this is the "no layer defines this name" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::ManifestNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
