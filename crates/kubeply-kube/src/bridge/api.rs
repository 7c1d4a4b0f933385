//! Bridge over the Kubernetes API
//!
//! Manifests are sent as `DynamicObject`s resolved through API discovery.
//! Writes mirror their kubectl counterparts: `apply` is a forced server-side
//! apply, `replace` deletes in the foreground, waits, then creates.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Client,
    api::{
        Api, DeleteParams, DynamicObject, ListParams, LogParams, Patch, PatchParams, PostParams,
    },
    core::{GroupVersionKind, TypeMeta},
    discovery::{ApiCapabilities, ApiResource, Discovery, Scope},
    runtime::wait::{await_condition, conditions},
};
use kubeply_core::Manifest;
use serde_yaml::{Mapping, Value};
use std::time::Duration;

use super::{ApiError, BridgeResult, ClusterBridge, PodLogs, with_read_retries};
use crate::error::{KubeError, Result};

/// Field manager name for Server-Side Apply
const FIELD_MANAGER: &str = "kubeply";

/// How long `replace` waits for the old object to disappear
const REPLACE_DELETE_TIMEOUT: Duration = Duration::from_secs(300);

/// Talks to the API server directly
#[derive(Clone)]
pub struct KubeApiBridge {
    client: Client,
    /// Cached discovery information
    discovery: std::sync::Arc<Discovery>,
}

impl KubeApiBridge {
    /// Run discovery against the cluster behind `client`
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = Discovery::new(client.clone())
            .run()
            .await
            .map_err(KubeError::Api)?;

        Ok(Self {
            client,
            discovery: std::sync::Arc::new(discovery),
        })
    }

    /// Connect with the default kubeconfig, optionally overriding its context
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let client = match context {
            Some(context) => {
                let options = kube::config::KubeConfigOptions {
                    context: Some(context.to_string()),
                    ..Default::default()
                };
                let config = kube::Config::from_kubeconfig(&options)
                    .await
                    .map_err(|e| ApiError::new("connect", e.to_string()))?;
                Client::try_from(config)?
            }
            None => Client::try_default().await?,
        };
        Self::new(client).await
    }

    /// Resolve a manifest's `apiVersion` and `kind`
    fn resolve_manifest(
        &self,
        operation: &str,
        obj: &DynamicObject,
    ) -> BridgeResult<(ApiResource, ApiCapabilities)> {
        let type_meta = obj
            .types
            .as_ref()
            .ok_or_else(|| ApiError::new(operation, "Resource missing apiVersion or kind"))?;
        let gvk = gvk_from_type_meta(type_meta);

        self.discovery
            .resolve_gvk(&gvk)
            .ok_or_else(|| no_matches_for_kind(operation, &type_meta.kind, &type_meta.api_version))
    }

    /// Resolve a bare kind name, preferring the most stable version
    fn resolve_kind(
        &self,
        operation: &str,
        kind: &str,
    ) -> BridgeResult<(ApiResource, ApiCapabilities)> {
        self.discovery
            .groups()
            .flat_map(|group| group.resources_by_stability())
            .find(|(ar, _)| ar.kind == kind)
            .ok_or_else(|| no_matches_for_kind(operation, kind, "any version"))
    }

    fn dynamic_api(
        &self,
        resource: &ApiResource,
        capabilities: &ApiCapabilities,
        namespace: Option<&str>,
    ) -> Api<DynamicObject> {
        if capabilities.scope == Scope::Namespaced {
            let ns = namespace.unwrap_or(self.client.default_namespace());
            Api::namespaced_with(self.client.clone(), ns, resource)
        } else {
            Api::all_with(self.client.clone(), resource)
        }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        let ns = namespace.unwrap_or(self.client.default_namespace());
        Api::namespaced(self.client.clone(), ns)
    }

    /// Parse a manifest and build the API handle for it
    fn prepare(
        &self,
        operation: &str,
        manifest: &Manifest,
        namespace: Option<&str>,
    ) -> BridgeResult<(Api<DynamicObject>, DynamicObject, String)> {
        let obj: DynamicObject = serde_yaml::from_value(manifest.inner().clone())
            .map_err(|e| ApiError::new(operation, format!("Invalid manifest: {}", e)))?;
        let name = obj
            .metadata
            .name
            .clone()
            .ok_or_else(|| ApiError::new(operation, "Resource missing metadata.name"))?;
        let (resource, capabilities) = self.resolve_manifest(operation, &obj)?;
        Ok((self.dynamic_api(&resource, &capabilities, namespace), obj, name))
    }

    async fn get_once(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<Value> {
        let (resource, capabilities) = self.resolve_kind("get", kind)?;
        let api = self.dynamic_api(&resource, &capabilities, namespace);

        match name {
            Some(name) => {
                let obj = api.get(name).await.map_err(|e| api_error("get", e))?;
                to_value("get", &obj)
            }
            None => {
                let list = api
                    .list(&ListParams::default())
                    .await
                    .map_err(|e| api_error("get", e))?;
                let items = list
                    .items
                    .iter()
                    .map(|obj| to_value("get", obj))
                    .collect::<BridgeResult<Vec<_>>>()?;
                let mut result = Mapping::new();
                result.insert(Value::String("items".to_string()), Value::Sequence(items));
                Ok(Value::Mapping(result))
            }
        }
    }

    async fn failed_pods_once(
        &self,
        job_name: &str,
        namespace: Option<&str>,
    ) -> BridgeResult<Vec<Value>> {
        let params = ListParams::default()
            .labels(&format!("job-name={}", job_name))
            .fields("status.phase=Failed");
        let pods = self
            .pods(namespace)
            .list(&params)
            .await
            .map_err(|e| api_error("get_failed_pods", e))?;

        pods.items
            .iter()
            .map(|pod| to_value("get_failed_pods", pod))
            .collect()
    }

    async fn logs_once(
        &self,
        pod: &str,
        container: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<PodLogs> {
        let params = LogParams {
            container: container.map(str::to_string),
            ..Default::default()
        };
        let stdout = self
            .pods(namespace)
            .logs(pod, &params)
            .await
            .map_err(|e| api_error("logs", e))?;

        Ok(PodLogs {
            stdout,
            stderr: String::new(),
        })
    }
}

#[async_trait]
impl ClusterBridge for KubeApiBridge {
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<Value> {
        with_read_retries("get", || self.get_once(kind, name, namespace)).await
    }

    async fn get_failed_pods(
        &self,
        job_name: &str,
        namespace: Option<&str>,
    ) -> BridgeResult<Vec<Value>> {
        with_read_retries("get_failed_pods", || {
            self.failed_pods_once(job_name, namespace)
        })
        .await
    }

    async fn logs(
        &self,
        pod: &str,
        container: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<PodLogs> {
        with_read_retries("logs", || self.logs_once(pod, container, namespace)).await
    }

    async fn create(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        let (api, obj, name) = self.prepare("create", manifest, namespace)?;
        tracing::debug!(%name, "creating through the API");

        api.create(&PostParams::default(), &obj)
            .await
            .map_err(|e| api_error("create", e))?;
        Ok(())
    }

    async fn apply(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        let (api, obj, name) = self.prepare("apply", manifest, namespace)?;
        tracing::debug!(%name, "server-side apply");

        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&name, &params, &Patch::Apply(&obj))
            .await
            .map_err(|e| api_error("apply", e))?;
        Ok(())
    }

    async fn replace(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        let (api, mut obj, name) = self.prepare("replace", manifest, namespace)?;
        tracing::debug!(%name, "replacing through the API");

        let existing = api
            .get_opt(&name)
            .await
            .map_err(|e| api_error("replace", e))?;

        if let Some(existing) = existing {
            api.delete(&name, &DeleteParams::foreground())
                .await
                .map_err(|e| api_error("replace", e))?;

            if let Some(uid) = existing.metadata.uid.as_deref() {
                let deleted = await_condition(api.clone(), &name, conditions::is_deleted(uid));
                match tokio::time::timeout(REPLACE_DELETE_TIMEOUT, deleted).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        return Err(ApiError::new(
                            "replace",
                            format!("Wait for deletion of {} failed: {}", name, e),
                        ));
                    }
                    Err(_) => {
                        return Err(ApiError::new(
                            "replace",
                            format!(
                                "{} was not deleted within {:?}",
                                name, REPLACE_DELETE_TIMEOUT
                            ),
                        ));
                    }
                }
            }
        }

        obj.metadata.resource_version = None;
        api.create(&PostParams::default(), &obj)
            .await
            .map_err(|e| api_error("replace", e))?;
        Ok(())
    }

    async fn delete(&self, kind: &str, name: &str, namespace: Option<&str>) -> BridgeResult<()> {
        let (resource, capabilities) = self.resolve_kind("delete", kind)?;
        let api = self.dynamic_api(&resource, &capabilities, namespace);

        api.delete(name, &DeleteParams::background())
            .await
            .map_err(|e| api_error("delete", e))?;
        Ok(())
    }
}

/// Convert TypeMeta to GroupVersionKind
///
/// - "apps/v1" -> group="apps", version="v1"
/// - "v1" -> group="", version="v1" (core API)
fn gvk_from_type_meta(tm: &TypeMeta) -> GroupVersionKind {
    let (group, version) = match tm.api_version.rsplit_once('/') {
        Some((g, v)) => (g.to_string(), v.to_string()),
        None => (String::new(), tm.api_version.clone()),
    };

    GroupVersionKind {
        group,
        version,
        kind: tm.kind.clone(),
    }
}

/// Same wording kubectl uses, so missing custom resources are recognised
fn no_matches_for_kind(operation: &str, kind: &str, version: &str) -> ApiError {
    ApiError::new(
        operation,
        format!("no matches for kind \"{}\" in version \"{}\"", kind, version),
    )
}

fn api_error(operation: &str, e: kube::Error) -> ApiError {
    ApiError::new(operation, e.to_string())
}

fn to_value<T: serde::Serialize>(operation: &str, obj: &T) -> BridgeResult<Value> {
    serde_yaml::to_value(obj)
        .map_err(|e| ApiError::new(operation, format!("Unreadable API response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_from_type_meta() {
        let tm = TypeMeta {
            api_version: "monitoring.coreos.com/v1".to_string(),
            kind: "ServiceMonitor".to_string(),
        };
        let gvk = gvk_from_type_meta(&tm);
        assert_eq!(gvk.group, "monitoring.coreos.com");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "ServiceMonitor");

        let tm_core = TypeMeta {
            api_version: "v1".to_string(),
            kind: "Pod".to_string(),
        };
        let gvk_core = gvk_from_type_meta(&tm_core);
        assert_eq!(gvk_core.group, "");
        assert_eq!(gvk_core.version, "v1");
    }

    #[test]
    fn test_unresolved_kind_matches_kubectl_wording() {
        let err = no_matches_for_kind("apply", "PrometheusRule", "monitoring.coreos.com/v1");

        assert!(err.is_no_matches_for_kind("PrometheusRule"));
    }

    #[test]
    fn test_manifest_converts_to_dynamic_object() {
        let manifest = Manifest::from_yaml(
            r#"
apiVersion: batch/v1
kind: Job
metadata:
  name: migrate
  namespace: backend
spec:
  backoffLimit: 0
"#,
        )
        .unwrap();

        let obj: DynamicObject = serde_yaml::from_value(manifest.inner().clone()).unwrap();

        assert_eq!(obj.metadata.name.as_deref(), Some("migrate"));
        assert_eq!(obj.types.unwrap().kind, "Job");
        assert_eq!(obj.data["spec"]["backoffLimit"], 0);
    }
}
