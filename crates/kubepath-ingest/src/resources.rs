//! Typed views of the Kubernetes objects the builder reads.
//!
//! Only the fields that feed the attack graph are modelled; everything else
//! in the API object is ignored on deserialization. Shapes follow the
//! `kubectl get -o json` output (`items` of a `List`).

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A listable resource kind.
pub trait Resource: DeserializeOwned {
    /// Plural resource name, as passed to `kubectl get`.
    const KIND: &'static str;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub uid: Option<String>,
    /// Key-ordered, matching how the API server serializes label maps.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// `key=value` strings in key order.
    pub fn label_list(&self) -> Vec<String> {
        self.labels.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

// ── Nodes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub kubelet_version: Option<String>,
    pub os_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub node_info: Option<NodeInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterNode {
    pub metadata: Option<ObjectMeta>,
    pub status: Option<NodeStatus>,
}

impl Resource for ClusterNode {
    const KIND: &'static str = "nodes";
}

// ── Service accounts & secrets ───────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectReference {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceAccount {
    pub metadata: Option<ObjectMeta>,
    #[serde(default)]
    pub secrets: Vec<ObjectReference>,
}

impl Resource for ServiceAccount {
    const KIND: &'static str = "serviceaccounts";
}

impl ServiceAccount {
    pub fn secret_names(&self) -> Vec<String> {
        self.secrets.iter().filter_map(|s| s.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: Option<ObjectMeta>,
    #[serde(rename = "type")]
    pub secret_type: Option<String>,
}

impl Resource for Secret {
    const KIND: &'static str = "secrets";
}

impl Secret {
    pub const SERVICE_ACCOUNT_TOKEN: &'static str = "kubernetes.io/service-account-token";

    pub fn is_service_account_token(&self) -> bool {
        self.secret_type.as_deref() == Some(Self::SERVICE_ACCOUNT_TOKEN)
    }
}

// ── Pods ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostPathSource {
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub name: String,
    pub host_path: Option<HostPathSource>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    pub node_name: Option<String>,
    pub service_account_name: Option<String>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub init_containers: Vec<Container>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pod {
    pub metadata: Option<ObjectMeta>,
    pub spec: Option<PodSpec>,
}

impl Resource for Pod {
    const KIND: &'static str = "pods";
}

// ── Collected state ──────────────────────────────────────────────

/// `kubectl get ... -o json` list envelope. Items stay untyped until
/// [`parse_items`] so one unreadable object cannot sink the listing.
#[derive(Debug, Deserialize)]
pub struct ObjectList {
    #[serde(default)]
    pub items: Vec<Value>,
}

/// Decode each item on its own, skipping (and logging) the ones that do
/// not fit the expected shape.
pub fn parse_items<T: Resource>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match serde_json::from_value(raw) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(kind = T::KIND, index, error = %e, "Skipping unreadable resource");
                None
            }
        })
        .collect()
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Resource,
{
    let items = Vec::<Value>::deserialize(deserializer)?;
    Ok(parse_items(items))
}

/// Everything listed from one cluster for one ingestion run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterResources {
    #[serde(default, deserialize_with = "lenient_items")]
    pub nodes: Vec<ClusterNode>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub service_accounts: Vec<ServiceAccount>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub secrets: Vec<Secret>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub pods: Vec<Pod>,
}

impl ClusterResources {
    pub fn total(&self) -> usize {
        self.nodes.len() + self.service_accounts.len() + self.secrets.len() + self.pods.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_parses_kubectl_shape() {
        let raw = r#"{
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web", "namespace": "ns1", "uid": "u-1",
                         "labels": {"tier": "front", "app": "web"}},
            "spec": {
                "nodeName": "worker-1",
                "serviceAccountName": "sa1",
                "volumes": [{"name": "root", "hostPath": {"path": "/", "type": ""}},
                            {"name": "cfg", "configMap": {"name": "cfg"}}],
                "containers": [{"name": "app", "image": "nginx:1.27"}],
                "initContainers": [{"name": "init", "image": "busybox"}]
            },
            "status": {"phase": "Running"}
        }"#;
        let pod: Pod = serde_json::from_str(raw).unwrap();
        let meta = pod.metadata.unwrap();
        assert_eq!(meta.label_list(), vec!["app=web", "tier=front"]);
        let spec = pod.spec.unwrap();
        assert_eq!(spec.volumes.len(), 2);
        assert!(spec.volumes[1].host_path.is_none());
        assert_eq!(spec.init_containers[0].name, "init");
    }

    #[test]
    fn list_envelope_without_items() {
        let list: ObjectList = serde_json::from_str(r#"{"kind": "List"}"#).unwrap();
        assert!(parse_items::<Secret>(list.items).is_empty());
    }

    #[test]
    fn unreadable_items_are_skipped() {
        let raw = r#"{"kind": "List", "items": [
            {"metadata": {"name": "good"}, "spec": {"containers": [{"name": "app"}]}},
            {"metadata": {"name": "bad"}, "spec": {"containers": [{"image": "nginx"}]}},
            {"metadata": {"name": "worse"}, "spec": {"volumes": [{"name": "v", "hostPath": {}}]}}
        ]}"#;
        let list: ObjectList = serde_json::from_str(raw).unwrap();
        let pods = parse_items::<Pod>(list.items);
        assert_eq!(pods.len(), 1);
        assert_eq!(pods[0].metadata.as_ref().unwrap().name.as_deref(), Some("good"));
    }

    #[test]
    fn snapshot_keeps_readable_resources() {
        let raw = r#"{
            "nodes": [{"metadata": {"name": "worker-1"}}, {"metadata": "not an object"}],
            "pods": [{"metadata": {"name": "bad"}, "spec": {"containers": [{}]}}]
        }"#;
        let resources: ClusterResources = serde_json::from_str(raw).unwrap();
        assert_eq!(resources.nodes.len(), 1);
        assert!(resources.pods.is_empty());
        assert_eq!(resources.total(), 1);
    }

    #[test]
    fn service_account_token_type() {
        let secret: Secret = serde_json::from_str(
            r#"{"metadata": {"name": "tok1"}, "type": "kubernetes.io/service-account-token"}"#,
        )
        .unwrap();
        assert!(secret.is_service_account_token());
    }
}
