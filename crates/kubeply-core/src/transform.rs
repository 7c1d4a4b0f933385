//! Deployment-time rewrites of pod-bearing manifests
//!
//! Every stage takes a manifest and returns a rewritten copy; the input is
//! never modified. [`transform_pod_manifest`] runs the stages in their fixed
//! order: image tagging, environment, host volumes, labels, annotations.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

use crate::crawler::Crawler;
use crate::error::Result;
use crate::manifest::{Manifest, key};
use crate::options::ApplyOptions;

/// Run the full rewrite pipeline for a pod-bearing manifest
pub fn transform_pod_manifest(manifest: &Manifest, options: &ApplyOptions) -> Result<Manifest> {
    let manifest = tag_untagged_images(manifest, &options.build_tag)?;
    let manifest = set_environment(&manifest, &options.environment)?;
    let manifest = add_host_volumes(&manifest, &options.host_volumes)?;
    let manifest = add_labels(&manifest, &options.labels, &options.pod_labels)?;
    add_annotations(&manifest, &options.annotations, &options.pod_annotations)
}

/// Append `:<tag>` to every container image that has no tag or digest
pub fn tag_untagged_images(manifest: &Manifest, tag: &str) -> Result<Manifest> {
    let mut new_manifest = manifest.clone();
    {
        let mut crawler = Crawler::new(&mut new_manifest)?;
        for container in crawler.containers()?.iter_mut() {
            let Some(Value::String(image)) = container.get_mut("image") else {
                continue;
            };
            if !is_tagged(image) {
                image.push(':');
                image.push_str(tag);
            }
        }
    }
    Ok(new_manifest)
}

/// Whether an image reference already pins a tag or digest.
///
/// Only the last path component is inspected, so a registry port
/// (`registry:5000/app`) does not count as a tag.
pub fn is_tagged(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    let last_component = image.rsplit('/').next().unwrap_or(image);
    last_component.contains(':')
}

/// Replace same-named environment entries on every container and append the
/// overrides in map order. Unrelated entries keep their position.
pub fn set_environment(
    manifest: &Manifest,
    environment: &IndexMap<String, String>,
) -> Result<Manifest> {
    let mut new_manifest = manifest.clone();
    if environment.is_empty() {
        return Ok(new_manifest);
    }
    {
        let mut crawler = Crawler::new(&mut new_manifest)?;
        for container in crawler.containers()?.iter_mut() {
            let Some(container) = container.as_mapping_mut() else {
                continue;
            };
            let env = container
                .entry(key("env"))
                .or_insert(Value::Sequence(Vec::new()));
            if !env.is_sequence() {
                *env = Value::Sequence(Vec::new());
            }
            if let Value::Sequence(entries) = env {
                entries.retain(|entry| {
                    entry
                        .get("name")
                        .and_then(Value::as_str)
                        .is_none_or(|name| !environment.contains_key(name))
                });
                entries.extend(environment.iter().map(|(name, value)| env_entry(name, value)));
            }
        }
    }
    Ok(new_manifest)
}

fn env_entry(name: &str, value: &str) -> Value {
    let mut entry = Mapping::new();
    entry.insert(key("name"), key(name));
    entry.insert(key("value"), key(value));
    Value::Mapping(entry)
}

/// Append a `hostPath` volume for each (name, path) pair.
///
/// Volumes are not de-duplicated against existing ones.
pub fn add_host_volumes(
    manifest: &Manifest,
    host_volumes: &IndexMap<String, String>,
) -> Result<Manifest> {
    let mut new_manifest = manifest.clone();
    if host_volumes.is_empty() {
        return Ok(new_manifest);
    }
    {
        let mut crawler = Crawler::new(&mut new_manifest)?;
        let volumes = crawler.volumes()?;
        for (name, path) in host_volumes {
            let mut host_path = Mapping::new();
            host_path.insert(key("path"), key(path));
            let mut volume = Mapping::new();
            volume.insert(key("name"), key(name));
            volume.insert(key("hostPath"), Value::Mapping(host_path));
            volumes.push(Value::Mapping(volume));
        }
    }
    Ok(new_manifest)
}

/// Merge labels into the manifest metadata and the pod template metadata
pub fn add_labels(
    manifest: &Manifest,
    labels: &IndexMap<String, String>,
    pod_labels: &IndexMap<String, String>,
) -> Result<Manifest> {
    add_metadata_entries(manifest, "labels", labels, pod_labels)
}

/// Merge annotations into the manifest metadata and the pod template metadata
pub fn add_annotations(
    manifest: &Manifest,
    annotations: &IndexMap<String, String>,
    pod_annotations: &IndexMap<String, String>,
) -> Result<Manifest> {
    add_metadata_entries(manifest, "annotations", annotations, pod_annotations)
}

fn add_metadata_entries(
    manifest: &Manifest,
    field: &str,
    resource_entries: &IndexMap<String, String>,
    pod_entries: &IndexMap<String, String>,
) -> Result<Manifest> {
    let mut new_manifest = manifest.clone();
    {
        let mut crawler = Crawler::new(&mut new_manifest)?;
        if !resource_entries.is_empty() {
            merge_string_map(crawler.metadata()?, field, resource_entries);
        }
        if !pod_entries.is_empty() {
            merge_string_map(crawler.pod_template_metadata()?, field, pod_entries);
        }
    }
    Ok(new_manifest)
}

fn merge_string_map(metadata: &mut Mapping, field: &str, entries: &IndexMap<String, String>) {
    let target = metadata
        .entry(key(field))
        .or_insert(Value::Mapping(Mapping::new()));
    if !target.is_mapping() {
        *target = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = target {
        for (name, value) in entries {
            map.insert(key(name), key(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(containers: &str) -> Manifest {
        Manifest::from_yaml(&format!(
            r#"
kind: Deployment
metadata:
  name: web
spec:
  template:
    spec:
      containers:
{containers}
"#
        ))
        .unwrap()
    }

    fn container(manifest: &Manifest, index: usize) -> &Value {
        &manifest
            .get("spec.template.spec.containers")
            .and_then(Value::as_sequence)
            .unwrap()[index]
    }

    fn image(manifest: &Manifest, index: usize) -> &str {
        container(manifest, index)
            .get("image")
            .and_then(Value::as_str)
            .unwrap()
    }

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_untagged_image_is_tagged() {
        let manifest = deployment("        - name: nginx-container\n          image: nginx");

        let new_manifest = tag_untagged_images(&manifest, "dev").unwrap();

        assert_eq!(image(&manifest, 0), "nginx");
        assert_eq!(image(&new_manifest, 0), "nginx:dev");
    }

    #[test]
    fn test_every_image_is_tagged() {
        let manifest = deployment(
            "        - name: nginx\n          image: nginx\n        - name: redis\n          image: redis",
        );

        let new_manifest = tag_untagged_images(&manifest, "dev").unwrap();

        assert_eq!(image(&new_manifest, 0), "nginx:dev");
        assert_eq!(image(&new_manifest, 1), "redis:dev");
    }

    #[test]
    fn test_tagged_image_is_left_alone() {
        let manifest = deployment("        - name: nginx\n          image: nginx:1.7.9");

        let once = tag_untagged_images(&manifest, "dev").unwrap();
        let twice = tag_untagged_images(&once, "other").unwrap();

        assert_eq!(image(&once, 0), "nginx:1.7.9");
        assert_eq!(twice, once);
    }

    #[test]
    fn test_is_tagged() {
        assert!(is_tagged("nginx:1.7.9"));
        assert!(is_tagged("registry:5000/team/app:v3"));
        assert!(is_tagged("app@sha256:abcdef"));
        assert!(!is_tagged("nginx"));
        assert!(!is_tagged("registry:5000/team/app"));
    }

    #[test]
    fn test_registry_port_image_is_tagged() {
        let manifest = deployment("        - name: app\n          image: registry:5000/app");

        let new_manifest = tag_untagged_images(&manifest, "dev").unwrap();

        assert_eq!(image(&new_manifest, 0), "registry:5000/app:dev");
    }

    #[test]
    fn test_environment_is_set() {
        let manifest = deployment("        - name: nginx\n          image: nginx");

        let new_manifest = set_environment(&manifest, &map(&[("DEBUG", "true")])).unwrap();

        let expected: Value = serde_yaml::from_str("[{name: DEBUG, value: 'true'}]").unwrap();
        assert_eq!(container(&new_manifest, 0).get("env"), Some(&expected));
        assert!(container(&manifest, 0).get("env").is_none());
    }

    #[test]
    fn test_environment_overrides_same_name() {
        let manifest = deployment(
            "        - name: nginx\n          image: nginx\n          env:\n            - {name: DEBUG, value: 'false'}",
        );

        let new_manifest = set_environment(&manifest, &map(&[("DEBUG", "true")])).unwrap();

        let expected: Value = serde_yaml::from_str("[{name: DEBUG, value: 'true'}]").unwrap();
        assert_eq!(container(&new_manifest, 0).get("env"), Some(&expected));
    }

    #[test]
    fn test_environment_keeps_other_entries() {
        let manifest = deployment(
            "        - name: nginx\n          image: nginx\n          env:\n            - {name: DEBUG, value: 'false'}",
        );

        let new_manifest = set_environment(&manifest, &map(&[("CONFIG", "dev")])).unwrap();

        let env = container(&new_manifest, 0)
            .get("env")
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(env.len(), 2);
        assert!(env.contains(&env_entry("DEBUG", "false")));
        assert!(env.contains(&env_entry("CONFIG", "dev")));
    }

    #[test]
    fn test_environment_on_every_container() {
        let manifest = deployment(
            "        - name: nginx\n          image: nginx\n        - name: redis\n          image: redis",
        );

        let new_manifest =
            set_environment(&manifest, &map(&[("DEBUG", "true"), ("CONFIG", "dev")])).unwrap();

        for index in 0..2 {
            let env = container(&new_manifest, index)
                .get("env")
                .and_then(Value::as_sequence)
                .unwrap();
            assert_eq!(
                env,
                &vec![env_entry("DEBUG", "true"), env_entry("CONFIG", "dev")]
            );
        }
    }

    #[test]
    fn test_empty_environment_is_noop() {
        let manifest = deployment("        - name: nginx\n          image: nginx");

        assert_eq!(set_environment(&manifest, &IndexMap::new()).unwrap(), manifest);
    }

    #[test]
    fn test_host_volumes_added() {
        let manifest = deployment("        - name: nginx\n          image: nginx");

        let new_manifest =
            add_host_volumes(&manifest, &map(&[("a", "/home"), ("b", "/tmp")])).unwrap();

        let expected: Value = serde_yaml::from_str(
            "[{name: a, hostPath: {path: /home}}, {name: b, hostPath: {path: /tmp}}]",
        )
        .unwrap();
        assert_eq!(new_manifest.get("spec.template.spec.volumes"), Some(&expected));
        assert!(manifest.get("spec.template.spec.volumes").is_none());
    }

    #[test]
    fn test_host_volumes_are_not_deduplicated() {
        let manifest = deployment("        - name: nginx\n          image: nginx");
        let volumes = map(&[("a", "/home")]);

        let once = add_host_volumes(&manifest, &volumes).unwrap();
        let twice = add_host_volumes(&once, &volumes).unwrap();

        let list = twice
            .get("spec.template.spec.volumes")
            .and_then(Value::as_sequence)
            .unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_labels_resource_and_pod_level() {
        let manifest = Manifest::from_yaml(
            r#"
kind: Deployment
metadata:
  name: web
  labels:
    app: web
    tier: backend
spec:
  template:
    spec:
      containers: []
"#,
        )
        .unwrap();

        let new_manifest = add_labels(
            &manifest,
            &map(&[("tier", "frontend")]),
            &map(&[("build", "42")]),
        )
        .unwrap();

        let labels: Value = serde_yaml::from_str("{app: web, tier: frontend}").unwrap();
        let pod_labels: Value = serde_yaml::from_str("{build: '42'}").unwrap();
        assert_eq!(new_manifest.get("metadata.labels"), Some(&labels));
        assert_eq!(
            new_manifest.get("spec.template.metadata.labels"),
            Some(&pod_labels)
        );
    }

    #[test]
    fn test_annotations_on_cronjob_template() {
        let manifest = Manifest::from_yaml(
            r#"
kind: CronJob
metadata:
  name: nightly
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers: []
"#,
        )
        .unwrap();

        let new_manifest =
            add_annotations(&manifest, &IndexMap::new(), &map(&[("team", "data")])).unwrap();

        assert!(new_manifest.get("metadata.annotations").is_none());
        assert_eq!(
            new_manifest
                .get("spec.jobTemplate.spec.template.metadata.annotations.team")
                .and_then(Value::as_str),
            Some("data")
        );
    }

    #[test]
    fn test_full_pipeline_on_job() {
        let manifest = Manifest::from_yaml(
            r#"
kind: Job
metadata:
  name: migrate
spec:
  template:
    spec:
      restartPolicy: Never
      containers:
        - name: migrate
          image: app
          env:
            - {name: LOG_LEVEL, value: info}
"#,
        )
        .unwrap();
        let options = ApplyOptions::new()
            .with_build_tag("b17")
            .with_env("LOG_LEVEL", "debug")
            .with_host_volume("cache", "/var/cache")
            .with_label("release", "b17")
            .with_pod_annotation("commit", "abc123");

        let new_manifest = transform_pod_manifest(&manifest, &options).unwrap();

        let expected = Manifest::from_yaml(
            r#"
kind: Job
metadata:
  name: migrate
  labels:
    release: b17
spec:
  template:
    spec:
      restartPolicy: Never
      containers:
        - name: migrate
          image: app:b17
          env:
            - {name: LOG_LEVEL, value: debug}
      volumes:
        - name: cache
          hostPath: {path: /var/cache}
    metadata:
      annotations:
        commit: abc123
"#,
        )
        .unwrap();
        assert_eq!(new_manifest, expected);
    }
}
