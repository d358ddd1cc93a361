//! The graph produced by one ingestion run.
//!
//! A snapshot is built once, handed to a graph store by value, and never
//! mutated afterwards. Its digest covers identity content only (ids, kinds,
//! criticality, edge triples and weights) so two builds of the same cluster
//! state hash identically regardless of when they were observed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AssetKind, AssetNode, AttackEdge, Criticality, Technique};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub cluster: String,
    pub observed_at: DateTime<Utc>,
    pub assets: Vec<AssetNode>,
    pub edges: Vec<AttackEdge>,
}

/// Hashable view of an asset (excludes timestamps).
#[derive(Serialize)]
struct HashableAsset<'a> {
    id: &'a str,
    kind: AssetKind,
    name: &'a str,
    namespace: Option<&'a str>,
    criticality: Criticality,
    labels: &'a [String],
}

#[derive(Serialize)]
struct HashableEdge<'a> {
    source: &'a str,
    target: &'a str,
    technique: Technique,
    evidence: Option<&'a str>,
    confidence: Option<f64>,
}

impl GraphSnapshot {
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of assets of the given kind.
    pub fn count_kind(&self, kind: AssetKind) -> usize {
        self.assets.iter().filter(|a| a.kind == kind).count()
    }

    /// BLAKE3 hex digest of the snapshot's identity content, order-independent.
    pub fn digest(&self) -> String {
        let mut assets: Vec<HashableAsset<'_>> = self
            .assets
            .iter()
            .map(|a| HashableAsset {
                id: &a.id,
                kind: a.kind,
                name: &a.name,
                namespace: a.namespace.as_deref(),
                criticality: a.criticality,
                labels: &a.labels,
            })
            .collect();
        assets.sort_by(|a, b| a.id.cmp(b.id));

        let mut edges: Vec<HashableEdge<'_>> = self
            .edges
            .iter()
            .map(|e| HashableEdge {
                source: &e.source,
                target: &e.target,
                technique: e.technique,
                evidence: e.evidence.as_deref(),
                confidence: e.confidence,
            })
            .collect();
        edges.sort_by(|a, b| {
            (a.source, a.target, a.technique).cmp(&(b.source, b.target, b.technique))
        });

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.cluster.as_bytes());
        for asset in &assets {
            // Serializing borrowed strings and enums cannot fail.
            if let Ok(bytes) = serde_json::to_vec(asset) {
                hasher.update(&bytes);
            }
        }
        for edge in &edges {
            if let Ok(bytes) = serde_json::to_vec(edge) {
                hasher.update(&bytes);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Attributes;

    fn asset(id: &str) -> AssetNode {
        AssetNode {
            id: id.to_string(),
            kind: AssetKind::Pod,
            name: id.to_string(),
            namespace: None,
            criticality: Criticality::Medium,
            labels: vec![],
            last_observed: Some(Utc::now()),
            attributes: Attributes::new(),
        }
    }

    fn snapshot(assets: Vec<AssetNode>, edges: Vec<AttackEdge>) -> GraphSnapshot {
        GraphSnapshot {
            cluster: "c".to_string(),
            observed_at: Utc::now(),
            assets,
            edges,
        }
    }

    #[test]
    fn digest_ignores_order_and_time() {
        let e1 = AttackEdge::new("a", "b", Technique::Membership, "x", 0.9);
        let e2 = AttackEdge::new("b", "a", Technique::Membership, "x", 0.9);
        let s1 = snapshot(vec![asset("a"), asset("b")], vec![e1.clone(), e2.clone()]);
        let s2 = snapshot(vec![asset("b"), asset("a")], vec![e2, e1]);
        assert_eq!(s1.digest(), s2.digest());
    }

    #[test]
    fn digest_changes_with_content() {
        let s1 = snapshot(vec![asset("a")], vec![]);
        let s2 = snapshot(vec![asset("a"), asset("b")], vec![]);
        assert_ne!(s1.digest(), s2.digest());
    }
}
