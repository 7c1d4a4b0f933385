//! Kind-aware access to the pod inside a manifest
//!
//! Pods, Jobs, controllers and CronJobs nest their pod specification at
//! different depths. [`Crawler`] hides that so rewrites can address
//! "the containers" or "the pod template labels" of any pod-bearing kind.
//! All accessors return mutable references into the manifest being rewritten.

use serde_yaml::{Mapping, Value};

use crate::error::{CoreError, Result};
use crate::kind::ResourceKind;
use crate::manifest::{Manifest, key};

/// Kinds that embed a pod specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodCarrier {
    Pod,
    Job,
    Deployment,
    StatefulSet,
    CronJob,
}

impl PodCarrier {
    /// Select the carrier for a kind, rejecting kinds without a pod
    pub fn for_kind(kind: ResourceKind) -> Result<Self> {
        match kind {
            ResourceKind::Pod => Ok(PodCarrier::Pod),
            ResourceKind::Job => Ok(PodCarrier::Job),
            ResourceKind::Deployment => Ok(PodCarrier::Deployment),
            ResourceKind::StatefulSet => Ok(PodCarrier::StatefulSet),
            ResourceKind::CronJob => Ok(PodCarrier::CronJob),
            other => Err(CoreError::NotPodBearing {
                kind: other.to_string(),
            }),
        }
    }

    /// Path from the manifest root to the pod template object.
    ///
    /// A bare Pod is its own template.
    fn template_path(&self) -> &'static [&'static str] {
        match self {
            PodCarrier::Pod => &[],
            PodCarrier::Job | PodCarrier::Deployment | PodCarrier::StatefulSet => {
                &["spec", "template"]
            }
            PodCarrier::CronJob => &["spec", "jobTemplate", "spec", "template"],
        }
    }
}

/// Mutable view over the pod parts of one manifest
pub struct Crawler<'a> {
    carrier: PodCarrier,
    root: &'a mut Value,
}

impl<'a> Crawler<'a> {
    /// Create a crawler for the manifest's declared kind
    pub fn new(manifest: &'a mut Manifest) -> Result<Self> {
        let kind: ResourceKind = manifest.require_kind()?.parse()?;
        let carrier = PodCarrier::for_kind(kind)?;
        Ok(Self {
            carrier,
            root: manifest.inner_mut(),
        })
    }

    /// The pod specification. It must already exist.
    pub fn pod_spec(&mut self) -> Result<&mut Mapping> {
        let mut path = self.carrier.template_path().to_vec();
        path.push("spec");
        let node = descend(self.root, &path)?;
        node.as_mapping_mut().ok_or_else(|| not_a_mapping(&path))
    }

    /// The pod's container list. It must already exist.
    pub fn containers(&mut self) -> Result<&mut Vec<Value>> {
        let spec = self.pod_spec()?;
        match spec.get_mut("containers") {
            Some(Value::Sequence(containers)) => Ok(containers),
            Some(_) => Err(CoreError::InvalidManifest {
                message: "pod spec 'containers' is not a list".to_string(),
            }),
            None => Err(CoreError::MissingField {
                field: "containers".to_string(),
            }),
        }
    }

    /// The pod's volume list, created empty when absent
    pub fn volumes(&mut self) -> Result<&mut Vec<Value>> {
        let spec = self.pod_spec()?;
        let volumes = spec
            .entry(key("volumes"))
            .or_insert(Value::Sequence(Vec::new()));
        if volumes.is_null() {
            *volumes = Value::Sequence(Vec::new());
        }
        volumes
            .as_sequence_mut()
            .ok_or_else(|| CoreError::InvalidManifest {
                message: "pod spec 'volumes' is not a list".to_string(),
            })
    }

    /// The manifest's own metadata, created empty when absent
    pub fn metadata(&mut self) -> Result<&mut Mapping> {
        mapping_at(self.root, &["metadata"])
    }

    /// The pod template's metadata, created empty when absent.
    ///
    /// For a bare Pod this is the manifest's own metadata.
    pub fn pod_template_metadata(&mut self) -> Result<&mut Mapping> {
        let mut path = self.carrier.template_path().to_vec();
        path.push("metadata");
        mapping_at(self.root, &path)
    }
}

/// Follow `path` through existing mappings
fn descend<'v>(mut node: &'v mut Value, path: &[&str]) -> Result<&'v mut Value> {
    for (depth, segment) in path.iter().enumerate() {
        match node.get_mut(*segment) {
            Some(next) if !next.is_null() => node = next,
            _ => {
                return Err(CoreError::MissingField {
                    field: path[..=depth].join("."),
                });
            }
        }
    }
    Ok(node)
}

/// Follow `path`, creating empty mappings for missing or null segments
fn mapping_at<'v>(mut node: &'v mut Value, path: &[&str]) -> Result<&'v mut Mapping> {
    for (depth, segment) in path.iter().enumerate() {
        if node.is_null() {
            *node = Value::Mapping(Mapping::new());
        }
        let map = node
            .as_mapping_mut()
            .ok_or_else(|| not_a_mapping(&path[..depth]))?;
        node = map.entry(key(segment)).or_insert(Value::Null);
    }
    if node.is_null() {
        *node = Value::Mapping(Mapping::new());
    }
    node.as_mapping_mut().ok_or_else(|| not_a_mapping(path))
}

fn not_a_mapping(path: &[&str]) -> CoreError {
    let location = if path.is_empty() {
        "manifest root".to_string()
    } else {
        format!("'{}'", path.join("."))
    };
    CoreError::InvalidManifest {
        message: format!("{location} is not a mapping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn containers_fixture() -> &'static str {
        r#"
- name: app
  image: web
- name: sidecar
  image: proxy:1.2
"#
    }

    fn manifest_for(kind: &str) -> Manifest {
        let containers: Value = serde_yaml::from_str(containers_fixture()).unwrap();
        let pod_spec = {
            let mut spec = Mapping::new();
            spec.insert(key("containers"), containers);
            Value::Mapping(spec)
        };
        let template = {
            let mut template = Mapping::new();
            template.insert(key("spec"), pod_spec.clone());
            Value::Mapping(template)
        };
        let spec = match kind {
            "Pod" => pod_spec,
            "CronJob" => {
                let mut job_spec = Mapping::new();
                job_spec.insert(key("template"), template);
                let mut job_template = Mapping::new();
                job_template.insert(key("spec"), Value::Mapping(job_spec));
                let mut spec = Mapping::new();
                spec.insert(key("jobTemplate"), Value::Mapping(job_template));
                Value::Mapping(spec)
            }
            _ => {
                let mut spec = Mapping::new();
                spec.insert(key("template"), template);
                Value::Mapping(spec)
            }
        };

        let mut root = Mapping::new();
        root.insert(key("kind"), key(kind));
        root.insert(key("spec"), spec);
        Manifest(Value::Mapping(root))
    }

    #[test]
    fn test_containers_for_every_carrier() {
        let expected: Vec<Value> = serde_yaml::from_str(containers_fixture()).unwrap();

        for kind in ["Pod", "Job", "Deployment", "StatefulSet", "CronJob"] {
            let mut manifest = manifest_for(kind);
            let mut crawler = Crawler::new(&mut manifest).unwrap();
            assert_eq!(crawler.containers().unwrap(), &expected, "kind {kind}");
        }
    }

    #[test]
    fn test_cronjob_pod_spec_path() {
        let mut manifest = manifest_for("CronJob");
        Crawler::new(&mut manifest)
            .unwrap()
            .pod_spec()
            .unwrap()
            .insert(key("restartPolicy"), key("Never"));

        assert_eq!(
            manifest
                .get("spec.jobTemplate.spec.template.spec.restartPolicy")
                .and_then(Value::as_str),
            Some("Never")
        );
    }

    #[test]
    fn test_volumes_created_when_absent() {
        let mut manifest = manifest_for("Deployment");
        Crawler::new(&mut manifest)
            .unwrap()
            .volumes()
            .unwrap()
            .push(key("scratch"));

        assert_eq!(
            manifest.get("spec.template.spec.volumes"),
            Some(&Value::Sequence(vec![key("scratch")]))
        );
    }

    #[test]
    fn test_metadata_created_when_absent() {
        let mut manifest = manifest_for("Job");
        let mut crawler = Crawler::new(&mut manifest).unwrap();
        crawler
            .metadata()
            .unwrap()
            .insert(key("name"), key("migrate"));
        crawler
            .pod_template_metadata()
            .unwrap()
            .insert(key("labels"), Value::Mapping(Mapping::new()));

        assert_eq!(manifest.name(), Some("migrate"));
        assert!(manifest.get("spec.template.metadata.labels").is_some());
    }

    #[test]
    fn test_pod_template_metadata_of_pod_is_own_metadata() {
        let mut manifest = manifest_for("Pod");
        Crawler::new(&mut manifest)
            .unwrap()
            .pod_template_metadata()
            .unwrap()
            .insert(key("name"), key("one-off"));

        assert_eq!(manifest.name(), Some("one-off"));
    }

    #[test]
    fn test_cronjob_template_metadata() {
        let mut manifest = manifest_for("CronJob");
        Crawler::new(&mut manifest)
            .unwrap()
            .pod_template_metadata()
            .unwrap()
            .insert(key("labels"), Value::Mapping(Mapping::new()));

        assert!(
            manifest
                .get("spec.jobTemplate.spec.template.metadata.labels")
                .is_some()
        );
    }

    #[test]
    fn test_missing_pod_spec() {
        let mut manifest = Manifest::from_yaml("kind: Deployment\nspec: {}\n").unwrap();
        let err = Crawler::new(&mut manifest)
            .unwrap()
            .containers()
            .unwrap_err();

        assert!(matches!(err, CoreError::MissingField { field } if field == "spec.template"));
    }

    #[test]
    fn test_missing_containers() {
        let mut manifest =
            Manifest::from_yaml("kind: Pod\nspec:\n  restartPolicy: Never\n").unwrap();
        let err = Crawler::new(&mut manifest)
            .unwrap()
            .containers()
            .unwrap_err();

        assert!(matches!(err, CoreError::MissingField { field } if field == "containers"));
    }

    #[test]
    fn test_apply_only_kind_rejected() {
        let mut manifest = Manifest::from_yaml("kind: ConfigMap\n").unwrap();

        assert!(matches!(
            Crawler::new(&mut manifest),
            Err(CoreError::NotPodBearing { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut manifest = Manifest::from_yaml("kind: Gizmo\n").unwrap();

        assert!(matches!(
            Crawler::new(&mut manifest),
            Err(CoreError::UnknownKind { .. })
        ));
    }
}
