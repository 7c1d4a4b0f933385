//! Integration tests for CLI commands
//!
//! Everything here renders offline; nothing reaches a cluster.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Helper to run the kubeply binary
fn kubeply(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_kubeply"))
        .args(args)
        .env_remove("KUBEPLY_BUILD_TAG")
        .env_remove("KUBEPLY_MAX_JOB_RETRIES")
        .env_remove("KUBEPLY_BACKEND")
        .output()
        .expect("Failed to execute kubeply")
}

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// A base layer with three manifests and a production overlay
fn fixture() -> TempDir {
    let root = TempDir::new().unwrap();
    let base = root.path().join("base");
    let prod = root.path().join("prod");
    fs::create_dir_all(&base).unwrap();
    fs::create_dir_all(&prod).unwrap();

    write(
        &base,
        "web.yml",
        r#"kind: Deployment
metadata:
  name: web
spec:
  replicas: 1
  template:
    spec:
      containers:
        - name: web
          image: registry.local:5000/web
          env:
            - name: MODE
              value: dev
"#,
    );
    write(
        &base,
        "settings.yaml",
        "kind: ConfigMap\nmetadata:\n  name: settings\ndata:\n  level: info\n",
    );
    write(
        &base,
        "migrate.yml",
        r#"kind: Job
metadata:
  name: migrate
spec:
  template:
    spec:
      restartPolicy: Never
      containers:
        - name: migrate
          image: app:1.2
"#,
    );
    write(&prod, "web.yml", "spec:\n  replicas: 3\n");

    root
}

fn dir(root: &TempDir, name: &str) -> String {
    root.path().join(name).display().to_string()
}

mod show_command {
    use super::*;

    #[test]
    fn test_show_merges_layers_and_rewrites() {
        let root = fixture();
        let output = kubeply(&[
            "show",
            "web",
            "-d",
            &dir(&root, "base"),
            "-d",
            &dir(&root, "prod"),
            "--build-tag",
            "b17",
            "--env",
            "MODE=prod",
            "--label-pod",
            "build=b17",
        ]);

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let doc: serde_yaml::Value = serde_yaml::from_str(&stdout).unwrap();
        assert_eq!(doc["spec"]["replicas"].as_u64(), Some(3));
        let container = &doc["spec"]["template"]["spec"]["containers"][0];
        assert_eq!(container["image"].as_str(), Some("registry.local:5000/web:b17"));
        assert_eq!(container["env"][0]["value"].as_str(), Some("prod"));
        assert_eq!(
            doc["spec"]["template"]["metadata"]["labels"]["build"].as_str(),
            Some("b17")
        );
    }

    #[test]
    fn test_show_keeps_plain_resources_verbatim() {
        let root = fixture();
        let output = kubeply(&[
            "show",
            "settings",
            "-d",
            &dir(&root, "base"),
            "--label",
            "team=core",
        ]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("level: info"));
        assert!(!stdout.contains("team"));
    }

    #[test]
    fn test_show_json() {
        let root = fixture();
        let output = kubeply(&[
            "show",
            "migrate",
            "settings",
            "-d",
            &dir(&root, "base"),
            "--output",
            "json",
        ]);

        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let documents = json.as_array().unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0]["kind"], "Job");
        assert_eq!(
            documents[0]["spec"]["template"]["spec"]["containers"][0]["image"],
            "app:1.2"
        );
        assert_eq!(documents[1]["kind"], "ConfigMap");
    }

    #[test]
    fn test_show_unknown_manifest() {
        let root = fixture();
        let output = kubeply(&["show", "nope", "-d", &dir(&root, "base")]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("nope"));
    }

    #[test]
    fn test_show_unknown_kind() {
        let root = fixture();
        write(
            &root.path().join("base"),
            "agent.yml",
            "kind: DaemonSet\nmetadata:\n  name: agent\n",
        );

        let output = kubeply(&["show", "agent", "-d", &dir(&root, "base")]);

        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Unknown resource kind: DaemonSet"));
    }
}

mod dry_run {
    use super::*;

    #[test]
    fn test_apply_all_dry_run_in_name_order() {
        let root = fixture();
        let output = kubeply(&[
            "apply-all",
            "--dry-run",
            "-d",
            &dir(&root, "base"),
            "-d",
            &dir(&root, "prod"),
        ]);

        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let stdout = String::from_utf8_lossy(&output.stdout);
        let kinds: Vec<String> = stdout
            .split("---\n")
            .map(|doc| {
                let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
                value["kind"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["Job", "ConfigMap", "Deployment"]);
    }

    #[test]
    fn test_apply_one_dry_run_keeps_given_order() {
        let root = fixture();
        let output = kubeply(&[
            "apply-one",
            "web",
            "migrate",
            "--dry-run",
            "-d",
            &dir(&root, "base"),
        ]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        let web = stdout.find("kind: Deployment").unwrap();
        let migrate = stdout.find("kind: Job").unwrap();
        assert!(web < migrate);
    }

    #[test]
    fn test_build_tag_from_environment() {
        let root = fixture();
        let output = Command::new(env!("CARGO_BIN_EXE_kubeply"))
            .args(["show", "web", "-d", &dir(&root, "base")])
            .env("KUBEPLY_BUILD_TAG", "from-env")
            .output()
            .unwrap();

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("registry.local:5000/web:from-env"));
    }
}

mod usage {
    use super::*;

    #[test]
    fn test_apply_one_requires_names() {
        let output = kubeply(&["apply-one"]);

        assert_eq!(output.status.code(), Some(64));
    }

    #[test]
    fn test_malformed_label() {
        let root = fixture();
        let output = kubeply(&[
            "show",
            "web",
            "-d",
            &dir(&root, "base"),
            "--label",
            "team",
        ]);

        assert_eq!(output.status.code(), Some(64));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Expected key=value"));
    }

    #[test]
    fn test_help_succeeds() {
        let output = kubeply(&["--help"]);

        assert!(output.status.success());
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("apply-all"));
        assert!(stdout.contains("apply-one"));
    }
}
