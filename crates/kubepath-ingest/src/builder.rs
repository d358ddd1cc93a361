//! Graph builder: cluster resources in, typed attack graph out.
//!
//! Pure and synchronous. Assets are deduplicated by id (a re-emitted id
//! overwrites in place), edges by `(source, target, technique)` (a
//! re-emitted triple is dropped). Edges may point at assets that are not in
//! the build; the store drops those at persist time.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde_json::json;

use kubepath_core::keys::{self, EdgeKey};
use kubepath_core::{
    AssetKind, AssetNode, AttackEdge, Attributes, Criticality, GraphSnapshot, Technique,
};

use crate::resources::{ClusterNode, ClusterResources, ObjectMeta, Pod, Secret, ServiceAccount};

/// Build the attack graph for one cluster snapshot.
pub fn build_graph(
    cluster: &str,
    resources: &ClusterResources,
    observed_at: DateTime<Utc>,
) -> GraphSnapshot {
    let mut builder = GraphBuilder::new(cluster, observed_at);
    builder.add_master();
    for node in &resources.nodes {
        builder.add_node(node);
    }
    for sa in &resources.service_accounts {
        builder.add_service_account(sa);
    }
    for secret in &resources.secrets {
        builder.add_secret(secret);
    }
    for pod in &resources.pods {
        builder.add_pod(pod);
    }
    builder.finish()
}

/// Accumulates assets and edges with keyed dedup.
pub struct GraphBuilder {
    cluster: String,
    observed_at: DateTime<Utc>,
    assets: Vec<AssetNode>,
    positions: HashMap<String, usize>,
    edges: Vec<AttackEdge>,
    edge_keys: HashSet<EdgeKey>,
}

/// Metadata and name of an object, or `None` when it cannot be identified.
fn identify(meta: Option<&ObjectMeta>) -> Option<(&ObjectMeta, &str)> {
    let meta = meta?;
    let name = meta.name.as_deref().filter(|n| !n.is_empty())?;
    Some((meta, name))
}

impl GraphBuilder {
    pub fn new(cluster: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            cluster: cluster.to_string(),
            observed_at,
            assets: Vec::new(),
            positions: HashMap::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
        }
    }

    fn id(&self, kind: AssetKind, namespace: Option<&str>, name: &str) -> String {
        keys::asset_id(&self.cluster, kind, namespace, name)
    }

    /// A fresh asset observed now, tagged with the cluster attribute.
    fn asset(
        &self,
        id: String,
        kind: AssetKind,
        name: &str,
        namespace: Option<&str>,
        criticality: Criticality,
    ) -> AssetNode {
        let mut attributes = Attributes::new();
        attributes.insert("cluster".to_string(), json!(self.cluster));
        AssetNode {
            id,
            kind,
            name: name.to_string(),
            namespace: namespace.filter(|ns| !ns.is_empty()).map(str::to_string),
            criticality,
            labels: Vec::new(),
            last_observed: Some(self.observed_at),
            attributes,
        }
    }

    /// Insert or overwrite by id, keeping the first insertion position.
    pub fn add_asset(&mut self, asset: AssetNode) {
        if let Some(&pos) = self.positions.get(&asset.id) {
            self.assets[pos] = asset;
            return;
        }
        self.positions.insert(asset.id.clone(), self.assets.len());
        self.assets.push(asset);
    }

    /// Append unless the `(source, target, technique)` triple was already seen.
    pub fn add_edge(&mut self, edge: AttackEdge) {
        if self.edge_keys.insert(EdgeKey::from(&edge)) {
            self.edges.push(edge);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    fn get(&self, id: &str) -> Option<&AssetNode> {
        self.positions.get(id).map(|&pos| &self.assets[pos])
    }

    pub fn add_master(&mut self) {
        let name = format!("{}-master", self.cluster);
        let master = self.asset(
            keys::master_id(&self.cluster),
            AssetKind::Master,
            &name,
            None,
            Criticality::High,
        );
        self.add_asset(master);
    }

    pub fn add_node(&mut self, node: &ClusterNode) {
        let Some((meta, name)) = identify(node.metadata.as_ref()) else {
            return;
        };
        let mut asset = self.asset(
            self.id(AssetKind::Node, None, name),
            AssetKind::Node,
            name,
            None,
            Criticality::Medium,
        );
        asset.labels = meta.label_list();
        if let Some(uid) = &meta.uid {
            asset.attributes.insert("k8sUid".to_string(), json!(uid));
        }
        let info = node.status.as_ref().and_then(|s| s.node_info.as_ref());
        if let Some(version) = info.and_then(|i| i.kubelet_version.as_ref()) {
            asset.attributes.insert("kubeletVersion".to_string(), json!(version));
        }
        if let Some(image) = info.and_then(|i| i.os_image.as_ref()) {
            asset.attributes.insert("osImage".to_string(), json!(image));
        }
        self.add_asset(asset);
    }

    pub fn add_service_account(&mut self, sa: &ServiceAccount) {
        let Some((meta, name)) = identify(sa.metadata.as_ref()) else {
            return;
        };
        let namespace = meta.namespace.as_deref();
        let mut asset = self.asset(
            self.id(AssetKind::ServiceAccount, namespace, name),
            AssetKind::ServiceAccount,
            name,
            namespace,
            Criticality::Medium,
        );
        asset.labels = meta.label_list();
        if let Some(uid) = &meta.uid {
            asset.attributes.insert("k8sUid".to_string(), json!(uid));
        }
        asset
            .attributes
            .insert("secrets".to_string(), json!(sa.secret_names()));
        self.add_asset(asset);
    }

    pub fn add_secret(&mut self, secret: &Secret) {
        let Some((meta, name)) = identify(secret.metadata.as_ref()) else {
            return;
        };
        let namespace = meta.namespace.as_deref();
        let is_token = secret.is_service_account_token();
        let secret_id = self.id(AssetKind::Secret, namespace, name);
        let criticality = if is_token {
            Criticality::High
        } else {
            Criticality::Medium
        };

        let mut asset = self.asset(secret_id.clone(), AssetKind::Secret, name, namespace, criticality);
        asset.labels = meta.label_list();
        if let Some(uid) = &meta.uid {
            asset.attributes.insert("k8sUid".to_string(), json!(uid));
        }
        if let Some(secret_type) = &secret.secret_type {
            asset.attributes.insert("secretType".to_string(), json!(secret_type));
        }
        self.add_asset(asset);

        if !is_token {
            return;
        }

        // A service-account token is a bearer credential for the API server.
        let credential_id = keys::credential_id(&secret_id);
        let mut credential = self.asset(
            credential_id.clone(),
            AssetKind::Credential,
            &format!("{name}-credential"),
            namespace,
            Criticality::High,
        );
        credential.attributes.insert("secret".to_string(), json!(name));
        self.add_asset(credential);

        self.add_edge(AttackEdge::new(
            &secret_id,
            &credential_id,
            Technique::ClusterCredentialAccess,
            "Service account token",
            0.7,
        ));
        self.add_edge(AttackEdge::new(
            &credential_id,
            keys::master_id(&self.cluster),
            Technique::ClusterCredentialAccess,
            "Token to master access",
            0.8,
        ));
    }

    pub fn add_pod(&mut self, pod: &Pod) {
        let Some((meta, name)) = identify(pod.metadata.as_ref()) else {
            return;
        };
        let namespace = meta.namespace.as_deref();
        let spec = pod.spec.as_ref();
        let node_name = spec.and_then(|s| s.node_name.as_deref()).filter(|n| !n.is_empty());
        let sa_name = spec
            .and_then(|s| s.service_account_name.as_deref())
            .filter(|n| !n.is_empty());

        let pod_id = self.id(AssetKind::Pod, namespace, name);
        let mut asset = self.asset(pod_id.clone(), AssetKind::Pod, name, namespace, Criticality::Medium);
        asset.labels = meta.label_list();
        if let Some(uid) = &meta.uid {
            asset.attributes.insert("k8sUid".to_string(), json!(uid));
        }
        if let Some(node_name) = node_name {
            asset.attributes.insert("nodeName".to_string(), json!(node_name));
        }
        self.add_asset(asset);

        if let Some(node_name) = node_name {
            self.add_edge(AttackEdge::new(
                self.id(AssetKind::Node, None, node_name),
                &pod_id,
                Technique::NodeRootAccess,
                "Pod scheduled on node",
                0.5,
            ));
        }

        let sa_id = sa_name.map(|sa| self.id(AssetKind::ServiceAccount, namespace, sa));
        if let Some(sa_id) = &sa_id {
            self.add_edge(AttackEdge::new(
                &pod_id,
                sa_id,
                Technique::PrivilegeDiscovery,
                "ServiceAccount mounted",
                0.6,
            ));
        }

        let Some(spec) = spec else {
            return;
        };

        for volume in &spec.volumes {
            let Some(host_path) = &volume.host_path else {
                continue;
            };
            let volume_id = self.id(
                AssetKind::Volume,
                namespace,
                &keys::pod_scoped_name(name, &volume.name),
            );
            let mut asset = self.asset(
                volume_id.clone(),
                AssetKind::Volume,
                &volume.name,
                namespace,
                Criticality::Medium,
            );
            asset
                .attributes
                .insert("hostPath".to_string(), json!(host_path.path));
            self.add_asset(asset);
            self.add_edge(AttackEdge::new(
                &pod_id,
                volume_id,
                Technique::MountDiscovery,
                host_path.path.as_str(),
                0.6,
            ));
        }

        for container in spec.containers.iter().chain(&spec.init_containers) {
            let container_id = self.id(
                AssetKind::Container,
                namespace,
                &keys::pod_scoped_name(name, &container.name),
            );
            let mut asset = self.asset(
                container_id.clone(),
                AssetKind::Container,
                &container.name,
                namespace,
                Criticality::Medium,
            );
            if let Some(image) = &container.image {
                asset.attributes.insert("image".to_string(), json!(image));
            }
            self.add_asset(asset);
            self.add_edge(AttackEdge::new(
                container_id,
                &pod_id,
                Technique::Membership,
                "Container part of Pod",
                0.9,
            ));
        }

        // Token secrets the pod's service account references, when both are in this build.
        if namespace.filter(|ns| !ns.is_empty()).is_none() {
            return;
        }
        let Some(sa_id) = sa_id else {
            return;
        };
        let secret_names: Vec<String> = match self.get(&sa_id) {
            Some(sa) => sa
                .attributes
                .get("secrets")
                .and_then(|v| v.as_array())
                .map(|names| {
                    names
                        .iter()
                        .filter_map(|n| n.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            None => return,
        };
        for secret_name in secret_names {
            let secret_id = self.id(AssetKind::Secret, namespace, &secret_name);
            if self.contains(&secret_id) {
                self.add_edge(AttackEdge::new(
                    &sa_id,
                    secret_id,
                    Technique::ClusterCredentialAccess,
                    "SA token secret",
                    0.7,
                ));
            }
        }
    }

    pub fn finish(self) -> GraphSnapshot {
        tracing::debug!(
            cluster = %self.cluster,
            assets = self.assets.len(),
            edges = self.edges.len(),
            "Attack graph built"
        );
        GraphSnapshot {
            cluster: self.cluster,
            observed_at: self.observed_at,
            assets: self.assets,
            edges: self.edges,
        }
    }
}
