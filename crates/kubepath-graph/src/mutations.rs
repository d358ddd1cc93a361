//! Write operations for the attack graph.
//!
//! All writes use MERGE (upsert) semantics keyed by asset id, and by
//! `(sourceId, targetId, technique)` for relationships, so re-ingesting
//! the same cluster state is idempotent.

use std::collections::HashMap;

use neo4rs::{query, BoltType};

use kubepath_core::types::ATTRIBUTE_PREFIX;
use kubepath_core::{AssetNode, AttackEdge};

use crate::client::{GraphClient, GraphError};

impl GraphClient {
    /// Delete every asset tagged with the cluster, detaching its relationships.
    pub async fn delete_cluster_assets(&self, cluster: &str) -> Result<u64, GraphError> {
        let q = query(
            "MATCH (n:Asset {cluster: $cluster})
             DETACH DELETE n
             RETURN count(n) AS deleted",
        )
        .param("cluster", cluster.to_string());

        self.query_count(q, "deleted").await
    }

    /// Upsert one batch of assets. Every stored field is replaced.
    pub async fn upsert_asset_batch(
        &self,
        cluster: &str,
        nodes: &[AssetNode],
    ) -> Result<u64, GraphError> {
        if nodes.is_empty() {
            return Ok(0);
        }
        let batch: Vec<BoltType> = nodes.iter().map(|n| node_row(cluster, n)).collect();

        let q = query(
            "UNWIND $batch AS row
             MERGE (n:Asset {id: row.id})
             SET n = row.props
             RETURN count(n) AS written",
        )
        .param("batch", batch);

        self.query_count(q, "written").await
    }

    /// Upsert one batch of edges. Edges whose endpoints are missing fall out
    /// of the MATCH and are not written.
    pub async fn upsert_edge_batch(&self, edges: &[AttackEdge]) -> Result<u64, GraphError> {
        if edges.is_empty() {
            return Ok(0);
        }
        let batch: Vec<BoltType> = edges.iter().map(edge_row).collect();

        let q = query(
            "UNWIND $batch AS rel
             MATCH (src:Asset {id: rel.source})
             MATCH (dst:Asset {id: rel.target})
             MERGE (src)-[r:ATTACK_REL {sourceId: rel.source, targetId: rel.target, technique: rel.technique}]->(dst)
             SET r += rel.props
             RETURN count(r) AS written",
        )
        .param("batch", batch);

        self.query_count(q, "written").await
    }
}

// ── Payloads ─────────────────────────────────────────────────────

/// `{id, props}` row for a node upsert. Null values are omitted so that
/// `SET n = row.props` leaves them unset.
fn node_row(cluster: &str, node: &AssetNode) -> BoltType {
    let mut props: HashMap<String, BoltType> = HashMap::new();
    props.insert("id".into(), node.id.clone().into());
    props.insert("name".into(), node.name.clone().into());
    if let Some(ns) = &node.namespace {
        props.insert("namespace".into(), ns.clone().into());
    }
    props.insert("kind".into(), node.kind.as_str().into());
    props.insert("criticality".into(), node.criticality.as_str().into());
    props.insert("labels".into(), node.labels.clone().into());
    if let Some(ts) = node.last_observed {
        props.insert("lastObserved".into(), ts.to_rfc3339().into());
    }
    props.insert("cluster".into(), cluster.into());
    for (key, value) in &node.attributes {
        if let Some(v) = json_to_bolt(value) {
            props.insert(format!("{ATTRIBUTE_PREFIX}{key}"), v);
        }
    }

    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("id".into(), node.id.clone().into());
    row.insert("props".into(), props.into());
    row.into()
}

fn edge_row(edge: &AttackEdge) -> BoltType {
    let mut props: HashMap<String, BoltType> = HashMap::new();
    if let Some(evidence) = &edge.evidence {
        props.insert("evidence".into(), evidence.clone().into());
    }
    if let Some(confidence) = edge.confidence {
        props.insert("confidence".into(), confidence.into());
    }
    if let Some(sequence) = edge.sequence {
        props.insert("sequence".into(), sequence.into());
    }

    let mut row: HashMap<String, BoltType> = HashMap::new();
    row.insert("source".into(), edge.source.clone().into());
    row.insert("target".into(), edge.target.clone().into());
    row.insert("technique".into(), edge.technique.as_str().into());
    row.insert("props".into(), props.into());
    row.into()
}

/// Convert an attribute value to a Bolt property. Nulls are dropped and
/// nested objects are stored as JSON text.
pub(crate) fn json_to_bolt(value: &serde_json::Value) -> Option<BoltType> {
    use serde_json::Value;

    match value {
        Value::Null => None,
        Value::Bool(b) => Some((*b).into()),
        Value::Number(n) => n
            .as_i64()
            .map(BoltType::from)
            .or_else(|| n.as_f64().map(BoltType::from)),
        Value::String(s) => Some(s.clone().into()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(json_to_bolt)
                .collect::<Vec<BoltType>>()
                .into(),
        ),
        Value::Object(_) => Some(value.to_string().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_null_is_dropped() {
        assert!(json_to_bolt(&serde_json::Value::Null).is_none());
    }

    #[test]
    fn json_scalars_convert() {
        assert!(json_to_bolt(&serde_json::json!("v1.29")).is_some());
        assert!(json_to_bolt(&serde_json::json!(3)).is_some());
        assert!(json_to_bolt(&serde_json::json!(0.5)).is_some());
        assert!(json_to_bolt(&serde_json::json!(["a", "b"])).is_some());
    }
}
