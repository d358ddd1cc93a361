//! Translate a built snapshot into batched store writes.

use std::time::Instant;

use serde::Serialize;

use kubepath_core::config::IngestSettings;
use kubepath_core::{GraphSnapshot, IngestionMode};

use crate::client::GraphError;
use crate::store::GraphStore;

/// Batch sizes used when writing a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    pub node_batch_size: usize,
    pub edge_batch_size: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self::from(&IngestSettings::default())
    }
}

impl From<&IngestSettings> for PersistOptions {
    fn from(settings: &IngestSettings) -> Self {
        Self {
            node_batch_size: settings.node_batch_size.max(1),
            edge_batch_size: settings.edge_batch_size.max(1),
        }
    }
}

/// What one persist call wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistSummary {
    /// Assets removed by a full refresh before writing.
    pub deleted: u64,
    pub nodes_written: u64,
    /// Edges actually stored; edges with a missing endpoint are not counted.
    pub edges_written: u64,
    /// Node batches plus edge batches issued.
    pub batches: usize,
}

/// Persist a snapshot with the default batch sizes (100 nodes, 200 edges).
pub async fn persist_graph<S>(
    store: &S,
    snapshot: GraphSnapshot,
    cluster: &str,
    mode: IngestionMode,
) -> Result<PersistSummary, GraphError>
where
    S: GraphStore + ?Sized,
{
    persist_graph_with(store, snapshot, cluster, mode, &PersistOptions::default()).await
}

/// Persist a snapshot: optional cluster wipe, then node batches, then edge batches.
///
/// Nodes are written before any edge so that edge upserts can match both
/// endpoints. There is no transaction around the whole run; readers may
/// observe a partially written graph.
pub async fn persist_graph_with<S>(
    store: &S,
    snapshot: GraphSnapshot,
    cluster: &str,
    mode: IngestionMode,
    options: &PersistOptions,
) -> Result<PersistSummary, GraphError>
where
    S: GraphStore + ?Sized,
{
    let started = Instant::now();
    let mut summary = PersistSummary::default();

    if mode == IngestionMode::Full {
        summary.deleted = store.delete_cluster(cluster).await?;
        tracing::info!(cluster, deleted = summary.deleted, "Cleared cluster for full refresh");
    }

    for chunk in snapshot.assets.chunks(options.node_batch_size.max(1)) {
        summary.nodes_written += store.upsert_nodes(cluster, chunk).await?;
        summary.batches += 1;
    }

    for chunk in snapshot.edges.chunks(options.edge_batch_size.max(1)) {
        summary.edges_written += store.upsert_edges(chunk).await?;
        summary.batches += 1;
    }

    let dropped = (snapshot.edges.len() as u64).saturating_sub(summary.edges_written);
    if dropped > 0 {
        tracing::debug!(cluster, dropped, "Edges skipped for missing endpoints");
    }

    tracing::info!(
        cluster,
        mode = ?mode,
        nodes = summary.nodes_written,
        edges = summary.edges_written,
        batches = summary.batches,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Persisted attack graph"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use kubepath_core::{AssetKind, AssetNode, AttackEdge, Attributes, Criticality, Technique};

    use super::*;
    use crate::memory::MemoryStore;

    fn asset(id: &str) -> AssetNode {
        AssetNode {
            id: id.to_string(),
            kind: AssetKind::Pod,
            name: id.to_string(),
            namespace: Some("ns1".to_string()),
            criticality: Criticality::Medium,
            labels: Vec::new(),
            last_observed: Some(Utc::now()),
            attributes: Attributes::new(),
        }
    }

    fn snapshot(ids: &[&str], edges: &[(&str, &str)]) -> GraphSnapshot {
        GraphSnapshot {
            cluster: "c1".to_string(),
            observed_at: Utc::now(),
            assets: ids.iter().map(|id| asset(id)).collect(),
            edges: edges
                .iter()
                .map(|(s, t)| AttackEdge::new(*s, *t, Technique::LateralMovement, "test", 0.5))
                .collect(),
        }
    }

    #[tokio::test]
    async fn full_refresh_replaces_cluster() {
        let store = MemoryStore::new();
        let s1 = snapshot(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        persist_graph(&store, s1, "c1", IngestionMode::Full).await.unwrap();
        assert_eq!(store.asset_count().await, 3);

        let s2 = snapshot(&["a", "b"], &[("a", "b")]);
        let summary = persist_graph(&store, s2, "c1", IngestionMode::Full).await.unwrap();
        assert_eq!(summary.deleted, 3);
        assert_eq!(store.asset_count().await, 2);
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn incremental_keeps_previous_state() {
        let store = MemoryStore::new();
        let s1 = snapshot(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        persist_graph(&store, s1, "c1", IngestionMode::Full).await.unwrap();

        let s2 = snapshot(&["a", "b"], &[("a", "b")]);
        let summary = persist_graph(&store, s2, "c1", IngestionMode::Incremental)
            .await
            .unwrap();
        assert_eq!(summary.deleted, 0);
        assert_eq!(store.asset_count().await, 3);
        assert_eq!(store.edge_count().await, 2);
    }

    #[tokio::test]
    async fn full_refresh_leaves_other_clusters_alone() {
        let store = MemoryStore::new();
        persist_graph(&store, snapshot(&["a"], &[]), "c1", IngestionMode::Full)
            .await
            .unwrap();
        persist_graph(&store, snapshot(&["z"], &[]), "c2", IngestionMode::Full)
            .await
            .unwrap();
        persist_graph(&store, snapshot(&["b"], &[]), "c1", IngestionMode::Full)
            .await
            .unwrap();
        assert_eq!(store.cluster_of("z").await.as_deref(), Some("c2"));
        assert!(store.cluster_of("a").await.is_none());
    }

    #[tokio::test]
    async fn dangling_edges_are_not_written() {
        let store = MemoryStore::new();
        let s = snapshot(&["a", "b"], &[("a", "b"), ("a", "missing")]);
        let summary = persist_graph(&store, s, "c1", IngestionMode::Full).await.unwrap();
        assert_eq!(summary.edges_written, 1);
        assert_eq!(store.edge_count().await, 1);
    }

    #[tokio::test]
    async fn writes_in_batches() {
        let store = MemoryStore::new();
        let ids: Vec<String> = (0..5).map(|i| format!("n{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let s = snapshot(&id_refs, &[("n0", "n1"), ("n1", "n2"), ("n2", "n3")]);
        let options = PersistOptions {
            node_batch_size: 2,
            edge_batch_size: 2,
        };
        let summary = persist_graph_with(&store, s, "c1", IngestionMode::Full, &options)
            .await
            .unwrap();
        // 3 node batches (2+2+1) and 2 edge batches (2+1).
        assert_eq!(summary.batches, 5);
        assert_eq!(summary.nodes_written, 5);
        assert_eq!(summary.edges_written, 3);
    }
}
