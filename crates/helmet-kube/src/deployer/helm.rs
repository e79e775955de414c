//! Helm binary and server-side apply

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DynamicObject, Patch, PatchParams},
    core::{GroupVersionKind, TypeMeta},
    discovery::{Discovery, Scope},
};
use serde::Deserialize;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::{Deployer, HelmRequest, install_args, list_args, uninstall_args, upgrade_args};
use crate::error::{KubeError, Result};

/// Helm prints the release values after this line with `--debug`
const VALUES_HEADER: &str = "USER-SUPPLIED VALUES:";

/// Deployer backed by the `helm` binary and the Kubernetes API
pub struct HelmDeployer {
    client: Client,
    helm_binary: String,
    field_manager: String,
}

/// Entry of `helm ls -o json`
#[derive(Debug, Deserialize)]
struct ListedRelease {
    name: String,
}

impl HelmDeployer {
    pub fn new(
        client: Client,
        helm_binary: impl Into<String>,
        field_manager: impl Into<String>,
    ) -> Self {
        Self {
            client,
            helm_binary: helm_binary.into(),
            field_manager: field_manager.into(),
        }
    }

    /// Run helm, streaming its output into the log
    ///
    /// Stdout after the values header is withheld. Stderr is kept for the
    /// error on failure.
    async fn run_helm(&self, args: &[String]) -> Result<String> {
        let command = format!("{} {}", self.helm_binary, args.join(" "));
        debug!(command = %command, "running helm");

        let mut child = Command::new(&self.helm_binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| KubeError::Subprocess {
                command: command.clone(),
                code: None,
                stderr: format!("failed to spawn: {}", e),
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (stdout, stderr, status) = tokio::join!(
            forward_lines(stdout, true),
            forward_lines(stderr, false),
            child.wait()
        );
        let status = status?;
        let stderr = stderr?;

        if status.success() {
            Ok(stdout?)
        } else {
            Err(KubeError::Subprocess {
                command,
                code: status.code(),
                stderr: stderr.trim().to_string(),
            })
        }
    }

    fn api_for(
        &self,
        obj: &DynamicObject,
        discovery: &Discovery,
        namespace: &str,
    ) -> Result<Api<DynamicObject>> {
        let types = obj.types.as_ref().ok_or_else(|| {
            KubeError::Validation("document missing apiVersion or kind".to_string())
        })?;
        let gvk = gvk_from_type_meta(types);

        let (resource, capabilities) = discovery.resolve_gvk(&gvk).ok_or_else(|| {
            KubeError::Validation(format!(
                "unknown resource type: {}/{}",
                types.api_version, types.kind
            ))
        })?;

        Ok(if capabilities.scope == Scope::Namespaced {
            let ns = obj.metadata.namespace.as_deref().unwrap_or(namespace);
            Api::namespaced_with(self.client.clone(), ns, &resource)
        } else {
            Api::all_with(self.client.clone(), &resource)
        })
    }
}

/// Forward each line of a child stream into the log, returning what was kept
async fn forward_lines<R>(stream: Option<R>, redact_values: bool) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return Ok(String::new());
    };

    let mut lines = BufReader::new(stream).lines();
    let mut kept = String::new();
    let mut withheld = false;

    while let Some(line) = lines.next_line().await? {
        if redact_values && line.trim() == VALUES_HEADER {
            withheld = true;
        }
        if withheld {
            continue;
        }
        debug!(target: "helmet::helm", "{}", line);
        kept.push_str(&line);
        kept.push('\n');
    }

    Ok(kept)
}

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

/// Names of the releases in `helm ls -o json` output
fn listed_names(output: &str) -> Result<Vec<String>> {
    let output = output.trim();
    if output.is_empty() {
        return Ok(Vec::new());
    }
    let releases: Vec<ListedRelease> = serde_json::from_str(output)?;
    Ok(releases.into_iter().map(|r| r.name).collect())
}

#[async_trait]
impl Deployer for HelmDeployer {
    async fn apply_documents(&self, namespace: &str, documents: &[serde_yaml::Value]) -> Result<()> {
        let discovery = Discovery::new(self.client.clone()).run().await?;

        let mut params = PatchParams::apply(&self.field_manager);
        params.force = true;

        for document in documents {
            let obj: DynamicObject = serde_yaml::from_value(document.clone())?;
            let name = obj.metadata.name.clone().ok_or_else(|| {
                KubeError::Validation("document missing metadata.name".to_string())
            })?;

            let api = self.api_for(&obj, &discovery, namespace)?;
            api.patch(&name, &params, &Patch::Apply(&obj)).await?;

            let kind = obj.types.as_ref().map(|t| t.kind.as_str()).unwrap_or("?");
            info!(kind, name = %name, "applied");
        }

        Ok(())
    }

    async fn release_exists(&self, release_name: &str, namespace: &str) -> Result<bool> {
        let output = self.run_helm(&list_args(namespace)).await?;
        Ok(listed_names(&output)?.iter().any(|name| name == release_name))
    }

    async fn install(&self, request: &HelmRequest) -> Result<()> {
        info!(release = %request.release_name, namespace = %request.namespace, "helm install");
        self.run_helm(&install_args(request)).await.map(|_| ())
    }

    async fn upgrade(&self, request: &HelmRequest) -> Result<()> {
        info!(release = %request.release_name, namespace = %request.namespace, "helm upgrade");
        self.run_helm(&upgrade_args(request)).await.map(|_| ())
    }

    async fn uninstall(&self, release_name: &str, namespace: &str) -> Result<()> {
        info!(release = release_name, namespace, "helm uninstall");
        self.run_helm(&uninstall_args(release_name, namespace))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_from_type_meta() {
        let gvk = gvk_from_type_meta(&TypeMeta {
            api_version: "apiextensions.k8s.io/v1".to_string(),
            kind: "CustomResourceDefinition".to_string(),
        });
        assert_eq!(gvk.group, "apiextensions.k8s.io");
        assert_eq!(gvk.version, "v1");

        let core = gvk_from_type_meta(&TypeMeta {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
        });
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
    }

    #[test]
    fn test_listed_names() {
        let output = r#"[{"name":"foo-namespaces","namespace":"ns","revision":"1","status":"deployed"},
                         {"name":"foo-resources","namespace":"ns","revision":"3","status":"failed"}]"#;
        assert_eq!(listed_names(output).unwrap(), vec!["foo-namespaces", "foo-resources"]);
        assert!(listed_names("").unwrap().is_empty());
        assert!(listed_names("not json").is_err());
    }

    #[tokio::test]
    async fn test_forward_lines_withholds_values() {
        let output: &[u8] = b"NAME: foo\nSTATUS: deployed\nUSER-SUPPLIED VALUES:\npassword: hunter2\n";
        let kept = forward_lines(Some(output), true).await.unwrap();
        assert_eq!(kept, "NAME: foo\nSTATUS: deployed\n");

        let kept = forward_lines(Some(output), false).await.unwrap();
        assert!(kept.contains("hunter2"));
    }
}
