//! Deployment-time options threaded through rewriting and monitoring

use indexmap::IndexMap;

use crate::error::{CoreError, Result};

/// Image tag used when none is given
pub const DEFAULT_BUILD_TAG: &str = "latest";

/// Options applied to every manifest of a deployment run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Tag appended to untagged container images
    pub build_tag: String,

    /// Labels added to each manifest's own metadata
    pub labels: IndexMap<String, String>,

    /// Labels added to each pod template
    pub pod_labels: IndexMap<String, String>,

    /// Annotations added to each manifest's own metadata
    pub annotations: IndexMap<String, String>,

    /// Annotations added to each pod template
    pub pod_annotations: IndexMap<String, String>,

    /// Host path volumes added to each pod (name -> path)
    pub host_volumes: IndexMap<String, String>,

    /// Environment variables set on every container
    pub environment: IndexMap<String, String>,

    /// Delete and recreate controllers instead of applying in place
    pub replace: bool,

    /// Number of failed job pods tolerated before the job is failed
    pub max_job_retries: u32,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            build_tag: DEFAULT_BUILD_TAG.to_string(),
            labels: IndexMap::new(),
            pod_labels: IndexMap::new(),
            annotations: IndexMap::new(),
            pod_annotations: IndexMap::new(),
            host_volumes: IndexMap::new(),
            environment: IndexMap::new(),
            replace: false,
            max_job_retries: 0,
        }
    }
}

impl ApplyOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tag for untagged images
    pub fn with_build_tag(mut self, tag: impl Into<String>) -> Self {
        self.build_tag = tag.into();
        self
    }

    /// Add a resource-level label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a pod template label
    pub fn with_pod_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pod_labels.insert(key.into(), value.into());
        self
    }

    /// Add a resource-level annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Add a pod template annotation
    pub fn with_pod_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pod_annotations.insert(key.into(), value.into());
        self
    }

    /// Mount a host path into every pod
    pub fn with_host_volume(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.host_volumes.insert(name.into(), path.into());
        self
    }

    /// Set an environment variable on every container
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }

    /// Recreate controllers instead of applying them
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    /// Tolerate this many failed job pods
    pub fn with_max_job_retries(mut self, retries: u32) -> Self {
        self.max_job_retries = retries;
        self
    }
}

/// Parse repeated `key=value` arguments into an ordered map.
///
/// The value may itself contain `=`. Later duplicates overwrite earlier ones
/// but keep the first position.
pub fn parse_key_value_pairs(args: &[String]) -> Result<IndexMap<String, String>> {
    let mut pairs = IndexMap::new();

    for arg in args {
        let (key, value) = arg.split_once('=').ok_or_else(|| CoreError::InvalidOption {
            message: format!("Invalid format: '{}'. Expected key=value", arg),
        })?;
        if key.is_empty() {
            return Err(CoreError::InvalidOption {
                message: format!("Invalid format: '{}'. Key must not be empty", arg),
            });
        }
        pairs.insert(key.to_string(), value.to_string());
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ApplyOptions::default();

        assert_eq!(options.build_tag, "latest");
        assert!(!options.replace);
        assert_eq!(options.max_job_retries, 0);
        assert!(options.environment.is_empty());
    }

    #[test]
    fn test_builder() {
        let options = ApplyOptions::new()
            .with_build_tag("dev")
            .with_env("DEBUG", "true")
            .with_host_volume("src", "/home/dev/src")
            .with_replace(true)
            .with_max_job_retries(2);

        assert_eq!(options.build_tag, "dev");
        assert_eq!(options.environment["DEBUG"], "true");
        assert_eq!(options.host_volumes["src"], "/home/dev/src");
        assert!(options.replace);
        assert_eq!(options.max_job_retries, 2);
    }

    #[test]
    fn test_parse_key_value_pairs() {
        let args = vec![
            "BUILD_NUMBER=2".to_string(),
            "dev-volume=/home".to_string(),
            "QUERY=a=b".to_string(),
        ];

        let pairs = parse_key_value_pairs(&args).unwrap();

        assert_eq!(
            pairs.iter().collect::<Vec<_>>(),
            vec![
                (&"BUILD_NUMBER".to_string(), &"2".to_string()),
                (&"dev-volume".to_string(), &"/home".to_string()),
                (&"QUERY".to_string(), &"a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_key_value_pairs_rejects_missing_separator() {
        let err = parse_key_value_pairs(&["DEBUG".to_string()]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOption { .. }));
    }

    #[test]
    fn test_parse_key_value_pairs_rejects_empty_key() {
        assert!(parse_key_value_pairs(&["=value".to_string()]).is_err());
    }

    #[test]
    fn test_parse_empty_value_allowed() {
        let pairs = parse_key_value_pairs(&["EMPTY=".to_string()]).unwrap();
        assert_eq!(pairs["EMPTY"], "");
    }
}
