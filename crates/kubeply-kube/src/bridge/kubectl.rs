//! Bridge over the `kubectl` command line
//!
//! Manifests are passed as YAML on stdin. A non-zero exit status becomes an
//! [`ApiError`] carrying kubectl's stderr, so messages such as
//! `no matches for kind "ServiceMonitor"` reach the apply strategies intact.

use async_trait::async_trait;
use kubeply_core::Manifest;
use serde_yaml::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;

use super::{ApiError, BridgeResult, ClusterBridge, PodLogs, with_read_retries};

/// Captured output of one kubectl invocation
struct CommandOutput {
    stdout: String,
    stderr: String,
}

/// Runs `kubectl` as a child process for every operation
#[derive(Debug, Clone)]
pub struct KubectlBridge {
    program: PathBuf,
    context: Option<String>,
}

impl Default for KubectlBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl KubectlBridge {
    /// Use `kubectl` from `PATH` with the current context
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("kubectl"),
            context: None,
        }
    }

    /// Use a specific kubectl binary
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Target a specific kubeconfig context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Full argument list for a kubectl invocation
    fn args(&self, command: &[&str], namespace: Option<&str>) -> Vec<String> {
        let mut args = Vec::with_capacity(command.len() + 4);
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        if let Some(ns) = namespace {
            args.push("-n".to_string());
            args.push(ns.to_string());
        }
        args.extend(command.iter().map(|s| s.to_string()));
        args
    }

    async fn run(
        &self,
        operation: &str,
        command: &[&str],
        namespace: Option<&str>,
        stdin: Option<String>,
    ) -> BridgeResult<CommandOutput> {
        let args = self.args(command, namespace);
        tracing::debug!(program = %self.program.display(), ?args, "running kubectl");

        let mut child = tokio::process::Command::new(&self.program)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ApiError::new(
                    operation,
                    format!("Failed to spawn {}: {}", self.program.display(), e),
                )
            })?;

        // kubectl may exit before reading its input; its stderr says why
        let write_error = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => pipe.write_all(input.as_bytes()).await.err(),
            _ => None,
        };

        let output = child.wait_with_output().await.map_err(|e| {
            ApiError::new(operation, format!("Failed to wait for kubectl: {}", e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() && write_error.is_none() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            let message = if !stderr.trim().is_empty() {
                stderr.trim().to_string()
            } else if let Some(e) = write_error {
                format!("Failed to write to kubectl stdin: {}", e)
            } else {
                format!("kubectl exited with {}", output.status)
            };
            Err(ApiError::new(operation, message))
        }
    }

    async fn run_with_manifest(
        &self,
        operation: &str,
        command: &[&str],
        manifest: &Manifest,
        namespace: Option<&str>,
    ) -> BridgeResult<()> {
        let yaml = manifest
            .to_yaml()
            .map_err(|e| ApiError::new(operation, format!("Failed to serialize manifest: {}", e)))?;
        self.run(operation, command, namespace, Some(yaml)).await?;
        Ok(())
    }

    async fn get_yaml(
        &self,
        operation: &str,
        command: &[&str],
        namespace: Option<&str>,
    ) -> BridgeResult<Value> {
        let output = self.run(operation, command, namespace, None).await?;
        serde_yaml::from_str(&output.stdout)
            .map_err(|e| ApiError::new(operation, format!("Unreadable kubectl output: {}", e)))
    }
}

#[async_trait]
impl ClusterBridge for KubectlBridge {
    async fn get(
        &self,
        kind: &str,
        name: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<Value> {
        let mut command = vec!["get", kind];
        command.extend(name);
        command.extend(["-o", "yaml"]);

        with_read_retries("get", || self.get_yaml("get", &command, namespace)).await
    }

    async fn get_failed_pods(
        &self,
        job_name: &str,
        namespace: Option<&str>,
    ) -> BridgeResult<Vec<Value>> {
        let selector = format!("job-name={}", job_name);
        let command = [
            "get",
            "pods",
            "-l",
            selector.as_str(),
            "--field-selector",
            "status.phase=Failed",
            "-o",
            "yaml",
        ];

        let list = with_read_retries("get_failed_pods", || {
            self.get_yaml("get_failed_pods", &command, namespace)
        })
        .await?;

        Ok(list
            .get("items")
            .and_then(Value::as_sequence)
            .cloned()
            .unwrap_or_default())
    }

    async fn logs(
        &self,
        pod: &str,
        container: Option<&str>,
        namespace: Option<&str>,
    ) -> BridgeResult<PodLogs> {
        let mut command = vec!["logs", pod];
        if let Some(container) = container {
            command.extend(["-c", container]);
        }

        let output =
            with_read_retries("logs", || self.run("logs", &command, namespace, None)).await?;
        Ok(PodLogs {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    async fn create(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.run_with_manifest("create", &["create", "-f", "-"], manifest, namespace)
            .await
    }

    async fn apply(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.run_with_manifest("apply", &["apply", "-f", "-"], manifest, namespace)
            .await
    }

    async fn replace(&self, manifest: &Manifest, namespace: Option<&str>) -> BridgeResult<()> {
        self.run_with_manifest(
            "replace",
            &["replace", "--force", "--cascade=background", "-f", "-"],
            manifest,
            namespace,
        )
        .await
    }

    async fn delete(&self, kind: &str, name: &str, namespace: Option<&str>) -> BridgeResult<()> {
        self.run("delete", &["delete", kind, name], namespace, None)
            .await?;
        Ok(())
    }
}
