//! Stable asset identity and edge dedup keys.
//!
//! Asset ids have the shape `{cluster}:{kind}:{namespace|global}:{name}` and
//! are the only join key used when upserting into a graph store. Edges are
//! unique per `(source, target, technique)`.

use crate::types::{AssetKind, AttackEdge, Technique};

/// Namespace component used for cluster-scoped resources.
pub const GLOBAL_SCOPE: &str = "global";

/// Suffix appended to a secret id to name the credential derived from it.
pub const CREDENTIAL_SUFFIX: &str = ":credential";

/// Name component of the single control-plane asset per cluster.
pub const MASTER_NAME: &str = "api-server";

/// Build the id of an asset.
pub fn asset_id(cluster: &str, kind: AssetKind, namespace: Option<&str>, name: &str) -> String {
    let scope = match namespace {
        Some(ns) if !ns.is_empty() => ns,
        _ => GLOBAL_SCOPE,
    };
    format!("{cluster}:{}:{scope}:{name}", kind.id_token())
}

/// Id of the cluster's control-plane asset.
pub fn master_id(cluster: &str) -> String {
    asset_id(cluster, AssetKind::Master, None, MASTER_NAME)
}

/// Id of the credential synthesized from a service-account-token secret.
pub fn credential_id(secret_id: &str) -> String {
    format!("{secret_id}{CREDENTIAL_SUFFIX}")
}

/// Name component for assets that live inside a pod (volumes, containers).
pub fn pod_scoped_name(pod: &str, child: &str) -> String {
    format!("{pod}-{child}")
}

/// Uniqueness key of an edge within one build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub technique: Technique,
}

impl From<&AttackEdge> for EdgeKey {
    fn from(edge: &AttackEdge) -> Self {
        Self {
            source: edge.source.clone(),
            target: edge.target.clone(),
            technique: edge.technique,
        }
    }
}
