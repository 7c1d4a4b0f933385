//! Show command - print rendered manifests without touching the cluster

use kubeply_kube::Deployer;

use crate::args::{DeployArgs, OutputFormat};
use crate::commands::deployer;
use crate::error::Result;

/// Run the show command
pub fn run(args: &DeployArgs, names: &[String]) -> Result<()> {
    let deployer = deployer(args, args.offline_bridge())?;
    print!("{}", render(&deployer, names, args.output)?);
    Ok(())
}

/// Render the named manifests exactly as they would be submitted
pub fn render(deployer: &Deployer, names: &[String], format: OutputFormat) -> Result<String> {
    let manifests = names
        .iter()
        .map(|name| deployer.get_merged(name))
        .collect::<kubeply_kube::Result<Vec<_>>>()?;

    match format {
        OutputFormat::Yaml => {
            let mut out = String::new();
            for (i, manifest) in manifests.iter().enumerate() {
                if i > 0 {
                    out.push_str("---\n");
                }
                out.push_str(&manifest.to_yaml()?);
            }
            Ok(out)
        }
        OutputFormat::Json => {
            let documents: Vec<_> = manifests.iter().map(|m| m.inner()).collect();
            let mut out = serde_json::to_string_pretty(&documents)?;
            out.push('\n');
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeply_core::{ApplyOptions, InMemoryLayer, Manifest};
    use kubeply_kube::MockBridge;
    use std::sync::Arc;

    fn deployer() -> Deployer {
        let layer = InMemoryLayer::new()
            .with(
                "config",
                Manifest::from_yaml("kind: ConfigMap\nmetadata:\n  name: config\n").unwrap(),
            )
            .with(
                "web",
                Manifest::from_yaml(
                    "kind: Deployment\nmetadata:\n  name: web\nspec:\n  template:\n    spec:\n      containers:\n        - name: web\n          image: web\n",
                )
                .unwrap(),
            );
        Deployer::new(
            layer,
            Arc::new(MockBridge::new()),
            ApplyOptions::new().with_build_tag("abc"),
        )
        .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_yaml_documents() {
        let out = render(&deployer(), &names(&["config", "web"]), OutputFormat::Yaml).unwrap();

        let documents: Vec<&str> = out.split("---\n").collect();
        assert_eq!(documents.len(), 2);
        assert!(documents[0].contains("kind: ConfigMap"));
        assert!(documents[1].contains("image: web:abc"));
    }

    #[test]
    fn test_render_json_array() {
        let out = render(&deployer(), &names(&["web"]), OutputFormat::Json).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            parsed[0]["spec"]["template"]["spec"]["containers"][0]["image"],
            "web:abc"
        );
    }

    #[test]
    fn test_render_unknown_name() {
        let err = render(&deployer(), &names(&["missing"]), OutputFormat::Yaml).unwrap_err();

        assert_eq!(err.exit_code(), crate::exit_codes::CONFIGURATION_ERROR);
    }
}
