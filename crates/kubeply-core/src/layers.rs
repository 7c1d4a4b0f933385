//! Named manifest sources and overlay composition
//!
//! A layer maps names to manifests. [`LayeredSet`] stacks layers so that a
//! lookup merges every layer defining the name, later layers overriding
//! earlier ones.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::manifest::Manifest;
use crate::merge::merge_manifests;

/// A source of named manifests
pub trait ManifestSource: Send + Sync {
    /// Resolve a name, failing with [`CoreError::ManifestNotFound`] when absent
    fn lookup(&self, name: &str) -> Result<Manifest>;

    /// All names this source defines, sorted
    fn names(&self) -> Result<Vec<String>>;

    /// Whether the source defines `name`
    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.names()?.iter().any(|n| n == name))
    }
}

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Manifests stored as `<name>.yml` files in one directory
#[derive(Debug, Clone)]
pub struct DirectoryLayer {
    root: PathBuf,
}

impl DirectoryLayer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file backing `name`; `.yml` is preferred over `.yaml`
    fn path_for(&self, name: &str) -> Option<PathBuf> {
        EXTENSIONS
            .iter()
            .map(|ext| self.root.join(format!("{name}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl ManifestSource for DirectoryLayer {
    fn lookup(&self, name: &str) -> Result<Manifest> {
        match self.path_for(name) {
            Some(path) => Manifest::from_file(path),
            None => Err(CoreError::ManifestNotFound {
                name: name.to_string(),
            }),
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_manifest = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext));
            if let (true, Some(stem)) = (is_manifest, path.file_stem().and_then(|s| s.to_str())) {
                names.push(stem.to_string());
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.path_for(name).is_some())
    }
}

/// Manifests held in memory, in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryLayer {
    manifests: IndexMap<String, Manifest>,
}

impl InMemoryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a manifest
    pub fn insert(&mut self, name: impl Into<String>, manifest: Manifest) {
        self.manifests.insert(name.into(), manifest);
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(mut self, name: impl Into<String>, manifest: Manifest) -> Self {
        self.insert(name, manifest);
        self
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}

impl ManifestSource for InMemoryLayer {
    fn lookup(&self, name: &str) -> Result<Manifest> {
        self.manifests
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ManifestNotFound {
                name: name.to_string(),
            })
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.manifests.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.manifests.contains_key(name))
    }
}

/// Ordered stack of layers, earliest is the base
#[derive(Default)]
pub struct LayeredSet {
    layers: Vec<Box<dyn ManifestSource>>,
}

impl LayeredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// One directory layer per path, in order
    pub fn from_directories<I, P>(directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        directories
            .into_iter()
            .fold(Self::new(), |set, dir| set.overlay(DirectoryLayer::new(dir)))
    }

    /// Stack another layer on top
    pub fn overlay(mut self, layer: impl ManifestSource + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl std::fmt::Debug for LayeredSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredSet")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl ManifestSource for LayeredSet {
    fn lookup(&self, name: &str) -> Result<Manifest> {
        let mut found = Vec::new();
        for layer in &self.layers {
            match layer.lookup(name) {
                Ok(manifest) => found.push(manifest),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        if found.is_empty() {
            return Err(CoreError::ManifestNotFound {
                name: name.to_string(),
            });
        }
        Ok(merge_manifests(&found))
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for layer in &self.layers {
            names.extend(layer.names()?);
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn contains(&self, name: &str) -> Result<bool> {
        for layer in &self.layers {
            if layer.contains(name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
