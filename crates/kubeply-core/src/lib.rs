//! Kubeply Core - manifest handling for the kubeply deployment driver
//!
//! This crate has no cluster access. It provides:
//! - `Manifest`: an untyped resource document
//! - `merge`: order-sensitive overlay merging
//! - `LayeredSet`: named manifests stacked from several layers
//! - `Crawler`: kind-aware access to the embedded pod
//! - `transform`: deployment-time rewrites driven by `ApplyOptions`

pub mod crawler;
pub mod error;
pub mod kind;
pub mod layers;
pub mod manifest;
pub mod merge;
pub mod options;
pub mod transform;

pub use crawler::{Crawler, PodCarrier};
pub use error::{CoreError, Result};
pub use kind::ResourceKind;
pub use layers::{DirectoryLayer, InMemoryLayer, LayeredSet, ManifestSource};
pub use manifest::Manifest;
pub use merge::{merge_manifests, merge_values};
pub use options::{ApplyOptions, DEFAULT_BUILD_TAG, parse_key_value_pairs};
pub use transform::transform_pod_manifest;
