//! Mock cluster bridge for testing
//!
//! Objects, statuses, failed pods and logs are scripted up front; every call
//! is recorded so tests can assert on what would have reached the cluster.

use async_trait::async_trait;
use kubeply_core::Manifest;
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use super::{ApiError, BridgeResult, ClusterBridge, PodLogs};

/// One recorded bridge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCall {
    Get {
        kind: String,
        name: Option<String>,
        namespace: Option<String>,
    },
    GetFailedPods {
        job: String,
        namespace: Option<String>,
    },
    Logs {
        pod: String,
        container: Option<String>,
        namespace: Option<String>,
    },
    Create {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
    Apply {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
    Replace {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
    Delete {
        kind: String,
        name: String,
        namespace: Option<String>,
    },
}

impl BridgeCall {
    /// The operation name, as used by [`MockBridge::fail_next`]
    pub fn operation(&self) -> &'static str {
        match self {
            BridgeCall::Get { .. } => "get",
            BridgeCall::GetFailedPods { .. } => "get_failed_pods",
            BridgeCall::Logs { .. } => "logs",
            BridgeCall::Create { .. } => "create",
            BridgeCall::Apply { .. } => "apply",
            BridgeCall::Replace { .. } => "replace",
            BridgeCall::Delete { .. } => "delete",
        }
    }
}

#[derive(Default)]
struct MockState {
    /// kind/name -> statuses returned by successive gets; the last one repeats
    statuses: HashMap<(String, String), VecDeque<Value>>,
    failed_pods: HashMap<String, Vec<Value>>,
    /// pod/container -> logs; a `None` container is the pod-wide fallback
    logs: HashMap<(String, Option<String>), PodLogs>,
    /// operation -> queued failures
    failures: HashMap<String, VecDeque<ApiError>>,
    calls: Vec<BridgeCall>,
    submitted: Vec<Manifest>,
}

/// In-memory bridge for testing
#[derive(Clone, Default)]
pub struct MockBridge {
    state: Arc<RwLock<MockState>>,
}

impl MockBridge {
    /// Create a new empty mock bridge
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the statuses returned for `kind`/`name`, one per `get`
    pub fn with_statuses(self, kind: &str, name: &str, statuses: Vec<Value>) -> Self {
        self.state
            .write()
            .unwrap()
            .statuses
            .insert((kind.to_string(), name.to_string()), statuses.into());
        self
    }

    /// Script a single status parsed from YAML
    pub fn with_status(self, kind: &str, name: &str, status_yaml: &str) -> Self {
        let status: Value = serde_yaml::from_str(status_yaml).unwrap();
        self.with_statuses(kind, name, vec![status])
    }

    /// Failed pods returned for a job
    pub fn with_failed_pods(self, job: &str, pods: Vec<Value>) -> Self {
        self.state
            .write()
            .unwrap()
            .failed_pods
            .insert(job.to_string(), pods);
        self
    }

    /// Logs returned for a pod, or for one container of it
    pub fn with_logs(self, pod: &str, container: Option<&str>, stdout: &str, stderr: &str) -> Self {
        self.state.write().unwrap().logs.insert(
            (pod.to_string(), container.map(str::to_string)),
            PodLogs {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        );
        self
    }

    /// Make the next call of `operation` fail with `message`
    pub fn fail_next(self, operation: &str, message: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .failures
            .entry(operation.to_string())
            .or_default()
            .push_back(ApiError::new(operation, message));
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<BridgeCall> {
        self.state.read().unwrap().calls.clone()
    }

    /// Number of calls of one operation
    pub fn count(&self, operation: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Manifests passed to create/apply/replace, in order
    pub fn submitted(&self) -> Vec<Manifest> {
        self.state.read().unwrap().submitted.clone()
    }

    fn record(&self, call: BridgeCall) -> BridgeResult<()> {
        let mut state = self.state.write().unwrap();
        let operation = call.operation();
        state.calls.push(call);
        match state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_write(
        &self,
        manifest: &Manifest,
        namespace: Option<&str>,
        call: fn(String, String, Option<String>) -> BridgeCall,
    ) -> BridgeResult<()> {
        let kind = manifest.kind().unwrap_or_default().to_string();
        let name = manifest.name().unwrap_or_default().to_string();
        self.record(call(kind, name, namespace.map(str::to_string)))?;
        self.state.write().unwrap().submitted.push(manifest.clone());
        Ok(())
    }
}

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

#[async_trait]
impl ClusterBridge for MockBridge {
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<Value> {
        self.record(BridgeCall::Get {
            kind: kind.to_string(),
            name: owned(name),
            namespace: owned(namespace),
        })?;

        let Some(name) = name else {
            let mut list = Mapping::new();
            list.insert(key("items"), Value::Sequence(Vec::new()));
            return Ok(Value::Mapping(list));
        };

        let mut state = self.state.write().unwrap();
        let statuses = state
            .statuses
            .get_mut(&(kind.to_string(), name.to_string()))
            .ok_or_else(|| {
                ApiError::new(
                    "get",
                    format!("Error from server (NotFound): {kind} \"{name}\" not found"),
                )
            })?;
        let status = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        }
        .unwrap_or(Value::Null);

        let mut metadata = Mapping::new();
        metadata.insert(key("name"), key(name));
        let mut object = Mapping::new();
        object.insert(key("kind"), key(kind));
        object.insert(key("metadata"), Value::Mapping(metadata));
        object.insert(key("status"), status);
        Ok(Value::Mapping(object))
    }

    async fn get_failed_pods(
        &self,
        job_name: &str,
        namespace: Option<&str>,
    ) -> BridgeResult<Vec<Value>> {
        self.record(BridgeCall::GetFailedPods {
            job: job_name.to_string(),
            namespace: owned(namespace),
        })?;
        Ok(self
            .state
            .read()
            .unwrap()
            .failed_pods
            .get(job_name)
            .cloned()
            .unwrap_or_default())
    }

    async fn logs(
        &self,
        pod: &str,
        container: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<PodLogs> {
        self.record(BridgeCall::Logs {
            pod: pod.to_string(),
            container: owned(container),
            namespace: owned(namespace),
        })?;
        let state = self.state.read().unwrap();
        Ok(state
            .logs
            .get(&(pod.to_string(), owned(container)))
            .or_else(|| state.logs.get(&(pod.to_string(), None)))
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.record_write(manifest, namespace, |kind, name, namespace| {
            BridgeCall::Create {
                kind,
                name,
                namespace,
            }
        })
    }

    async fn apply(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.record_write(manifest, namespace, |kind, name, namespace| {
            BridgeCall::Apply {
                kind,
                name,
                namespace,
            }
        })
    }

    async fn replace(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.record_write(manifest, namespace, |kind, name, namespace| {
            BridgeCall::Replace {
                kind,
                name,
                namespace,
            }
        })
    }

    async fn delete(&self, kind: &str, name: &str, namespace: Option<&str>) -> BridgeResult<()> {
        self.record(BridgeCall::Delete {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: owned(namespace),
        })
    }
}
