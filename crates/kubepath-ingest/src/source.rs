//! Where cluster resources come from.
//!
//! [`KubectlSource`] runs `kubectl` as a child process via
//! `tokio::process::Command` and parses its JSON output.
//! [`SnapshotFileSource`] replays a recorded JSON document, for offline
//! analysis and tests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::OnceCell;

use crate::error::{IngestError, Result};
use crate::resources::{
    parse_items, ClusterNode, ClusterResources, ObjectList, Pod, Resource, Secret, ServiceAccount,
};

/// A cluster that can be listed one resource kind at a time.
///
/// `connect` failing is fatal for an ingestion job. Each `list_*` call may
/// fail on its own; the collector treats such a failure as an empty list.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    /// Human-readable origin, for job logs.
    fn describe(&self) -> String;

    async fn connect(&self) -> Result<()>;

    async fn list_nodes(&self) -> Result<Vec<ClusterNode>>;

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>>;

    async fn list_secrets(&self) -> Result<Vec<Secret>>;

    async fn list_pods(&self) -> Result<Vec<Pod>>;
}

// ── kubectl ──────────────────────────────────────────────────────

/// Wrapper around the kubectl binary, bound to one kubeconfig.
pub struct KubectlSource {
    kubectl_path: String,
    kubeconfig: PathBuf,
}

impl KubectlSource {
    pub fn new(kubectl_path: &str, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubectl_path: kubectl_path.to_string(),
            kubeconfig: kubeconfig.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.kubectl_path);
        cmd.arg("--kubeconfig").arg(&self.kubeconfig);
        cmd
    }

    /// `kubectl get <resource> [-A] -o json`, returning the readable list items.
    async fn get<T: Resource>(&self, all_namespaces: bool) -> Result<Vec<T>> {
        let start = Instant::now();
        let resource = T::KIND;
        let mut cmd = self.command();
        cmd.arg("get").arg(resource);
        if all_namespaces {
            cmd.arg("--all-namespaces");
        }
        cmd.arg("-o").arg("json");

        let listing_err = |reason: String| IngestError::Listing {
            kind: resource.to_string(),
            reason,
        };

        let output = cmd
            .output()
            .await
            .map_err(|e| listing_err(format!("{}: {e}", self.kubectl_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(listing_err(format!(
                "kubectl exited with code {}: {stderr}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let list: ObjectList = serde_json::from_slice(&output.stdout)
            .map_err(|e| listing_err(format!("unparsable output: {e}")))?;
        let listed = list.items.len();
        let items = parse_items::<T>(list.items);

        tracing::debug!(
            resource,
            listed,
            items = items.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "kubectl listing complete"
        );
        Ok(items)
    }
}

#[async_trait]
impl ClusterSource for KubectlSource {
    fn describe(&self) -> String {
        format!("kubeconfig {}", self.kubeconfig.display())
    }

    /// Verify kubectl is installed and the API server answers.
    async fn connect(&self) -> Result<()> {
        let output = self
            .command()
            .arg("cluster-info")
            .output()
            .await
            .map_err(|e| IngestError::Unreachable {
                reason: format!("cannot run {}: {e}", self.kubectl_path),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(IngestError::Unreachable { reason: stderr });
        }
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
        self.get(false).await
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>> {
        self.get(true).await
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>> {
        self.get(true).await
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        self.get(true).await
    }
}

// ── Snapshot file ────────────────────────────────────────────────

/// A recorded cluster: one JSON document with `nodes`, `serviceAccounts`,
/// `secrets` and `pods` arrays of Kubernetes API objects.
pub struct SnapshotFileSource {
    path: PathBuf,
    loaded: OnceCell<ClusterResources>,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loaded: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<ClusterResources> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|e| IngestError::Unreachable {
                reason: format!("cannot read snapshot {}: {e}", self.path.display()),
            })?;
        serde_json::from_slice(&raw).map_err(|e| IngestError::Snapshot(e.to_string()))
    }

    fn resources(&self, kind: &str) -> Result<&ClusterResources> {
        self.loaded.get().ok_or_else(|| IngestError::Listing {
            kind: kind.to_string(),
            reason: "snapshot not loaded".to_string(),
        })
    }
}

#[async_trait]
impl ClusterSource for SnapshotFileSource {
    fn describe(&self) -> String {
        format!("snapshot {}", self.path.display())
    }

    async fn connect(&self) -> Result<()> {
        self.loaded.get_or_try_init(|| self.read()).await?;
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
        Ok(self.resources(ClusterNode::KIND)?.nodes.clone())
    }

    async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>> {
        Ok(self.resources(ServiceAccount::KIND)?.service_accounts.clone())
    }

    async fn list_secrets(&self) -> Result<Vec<Secret>> {
        Ok(self.resources(Secret::KIND)?.secrets.clone())
    }

    async fn list_pods(&self) -> Result<Vec<Pod>> {
        Ok(self.resources(Pod::KIND)?.pods.clone())
    }
}
