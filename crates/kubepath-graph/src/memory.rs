//! In-memory [`GraphStore`] for tests, dry runs, and small clusters.
//!
//! Mirrors the Neo4j store's semantics: assets upsert by id and carry a
//! cluster tag, edges upsert by `(source, target, technique)` and are only
//! written when both endpoints exist, and path search enumerates
//! relationship-unique walks scored with the shared formula.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use kubepath_core::keys::EdgeKey;
use kubepath_core::scoring;
use kubepath_core::{AssetKind, AssetNode, AttackEdge};

use crate::client::GraphError;
use crate::store::{
    AssetDetail, AssetFilter, AssetPage, GraphStore, KindCount, PathQuery, StoredPath,
};

#[derive(Debug, Clone)]
struct StoredAsset {
    cluster: String,
    node: AssetNode,
}

#[derive(Debug, Default)]
struct Inner {
    /// Assets keyed by id; iteration order is the start-node order for search.
    assets: BTreeMap<String, StoredAsset>,
    /// Edges in first-write order.
    edges: Vec<AttackEdge>,
    edge_index: HashMap<EdgeKey, usize>,
}

impl Inner {
    fn reindex_edges(&mut self) {
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (EdgeKey::from(e), i))
            .collect();
    }

    /// Outgoing edge positions per source id, in edge order.
    fn adjacency(&self) -> HashMap<&str, Vec<usize>> {
        let mut adjacency: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, edge) in self.edges.iter().enumerate() {
            adjacency.entry(edge.source.as_str()).or_default().push(i);
        }
        adjacency
    }
}

/// DFS frontier entry: the node reached and the edge positions walked so far.
struct DfsState<'a> {
    node: &'a str,
    path_edges: Vec<usize>,
}

/// A graph store held entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn asset_count(&self) -> usize {
        self.inner.read().await.assets.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }

    /// Cluster tag of a stored asset.
    pub async fn cluster_of(&self, id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .assets
            .get(id)
            .map(|a| a.cluster.clone())
    }
}

fn matches_namespace(node: &AssetNode, namespace: Option<&str>) -> bool {
    match namespace {
        Some(ns) => node.namespace.as_deref().unwrap_or("") == ns,
        None => true,
    }
}

fn is_start(node: &AssetNode, pq: &PathQuery) -> bool {
    if let Some(id) = &pq.start_node_id {
        if &node.id != id {
            return false;
        }
    }
    if let Some(kind) = pq.start_kind {
        if node.kind != kind {
            return false;
        }
    }
    matches_namespace(node, pq.namespace.as_deref())
}

fn is_target(node: &AssetNode, pq: &PathQuery) -> bool {
    if let Some(kind) = pq.target_kind {
        if node.kind != kind {
            return false;
        }
    }
    matches_namespace(node, pq.namespace.as_deref())
}

fn matches_filter(node: &AssetNode, filter: &AssetFilter) -> bool {
    if let Some(kind) = filter.kind {
        if node.kind != kind {
            return false;
        }
    }
    if let Some(ns) = &filter.namespace {
        if !node.namespace.as_deref().unwrap_or("").contains(ns.as_str()) {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        if !node.name.to_lowercase().contains(&needle) && &node.id != search {
            return false;
        }
    }
    true
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn delete_cluster(&self, cluster: &str) -> Result<u64, GraphError> {
        let mut inner = self.inner.write().await;
        let doomed: HashSet<String> = inner
            .assets
            .iter()
            .filter(|(_, a)| a.cluster == cluster)
            .map(|(id, _)| id.clone())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        inner.assets.retain(|id, _| !doomed.contains(id));
        inner
            .edges
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));
        inner.reindex_edges();
        Ok(doomed.len() as u64)
    }

    async fn upsert_nodes(&self, cluster: &str, nodes: &[AssetNode]) -> Result<u64, GraphError> {
        let mut inner = self.inner.write().await;
        for node in nodes {
            inner.assets.insert(
                node.id.clone(),
                StoredAsset {
                    cluster: cluster.to_string(),
                    node: node.clone(),
                },
            );
        }
        Ok(nodes.len() as u64)
    }

    async fn upsert_edges(&self, edges: &[AttackEdge]) -> Result<u64, GraphError> {
        let mut inner = self.inner.write().await;
        let mut written = 0u64;
        for edge in edges {
            if !inner.assets.contains_key(&edge.source) || !inner.assets.contains_key(&edge.target)
            {
                continue;
            }
            let key = EdgeKey::from(edge);
            let existing = inner.edge_index.get(&key).copied();
            match existing {
                Some(pos) => inner.edges[pos] = edge.clone(),
                None => {
                    let pos = inner.edges.len();
                    inner.edges.push(edge.clone());
                    inner.edge_index.insert(key, pos);
                }
            }
            written += 1;
        }
        Ok(written)
    }

    async fn find_paths(&self, pq: &PathQuery) -> Result<Vec<StoredPath>, GraphError> {
        let inner = self.inner.read().await;
        let adjacency = inner.adjacency();
        let mut found = Vec::new();

        for start in inner.assets.values().filter(|a| is_start(&a.node, pq)) {
            let mut stack = vec![DfsState {
                node: start.node.id.as_str(),
                path_edges: Vec::new(),
            }];

            while let Some(state) = stack.pop() {
                if !state.path_edges.is_empty() {
                    if let Some(reached) = inner.assets.get(state.node) {
                        if is_target(&reached.node, pq) {
                            found.push((start.node.id.as_str(), state.path_edges.clone()));
                        }
                    }
                }

                if state.path_edges.len() >= pq.max_depth {
                    continue;
                }

                let Some(outgoing) = adjacency.get(state.node) else {
                    continue;
                };
                // Reverse push so the first stored edge is explored first.
                for &pos in outgoing.iter().rev() {
                    if state.path_edges.contains(&pos) {
                        continue;
                    }
                    let mut path_edges = state.path_edges.clone();
                    path_edges.push(pos);
                    stack.push(DfsState {
                        node: inner.edges[pos].target.as_str(),
                        path_edges,
                    });
                }
            }
        }

        let mut paths: Vec<StoredPath> = found
            .into_iter()
            .filter_map(|(start_id, positions)| {
                let mut nodes = vec![inner.assets.get(start_id)?.node.clone()];
                let mut edges = Vec::with_capacity(positions.len());
                for pos in positions {
                    let edge = &inner.edges[pos];
                    nodes.push(inner.assets.get(&edge.target)?.node.clone());
                    edges.push(edge.clone());
                }
                let score = scoring::path_score(
                    edges
                        .iter()
                        .zip(nodes.iter().skip(1))
                        .map(|(e, n)| (e.confidence, Some(n.criticality.as_str()))),
                );
                Some(StoredPath {
                    nodes,
                    edges,
                    score,
                })
            })
            .collect();

        paths.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        paths.truncate(pq.limit);
        Ok(paths)
    }

    async fn list_cluster_assets(&self, cluster: &str) -> Result<Vec<AssetNode>, GraphError> {
        let inner = self.inner.read().await;
        Ok(inner
            .assets
            .values()
            .filter(|a| a.cluster == cluster)
            .map(|a| a.node.clone())
            .collect())
    }

    async fn list_assets(&self, filter: &AssetFilter) -> Result<AssetPage, GraphError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&AssetNode> = inner
            .assets
            .values()
            .map(|a| &a.node)
            .filter(|n| matches_filter(n, filter))
            .collect();
        // Most recent first; unobserved assets last.
        matched.sort_by(|a, b| b.last_observed.cmp(&a.last_observed));

        let page_size = filter.page_size.clamp(1, AssetFilter::MAX_PAGE_SIZE);
        let offset = u64::from(filter.page.max(1) - 1) * u64::from(page_size);
        let items = matched
            .iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .map(|n| (*n).clone())
            .collect();

        Ok(AssetPage {
            items,
            total: matched.len() as u64,
            page: filter.page.max(1),
            page_size,
        })
    }

    async fn asset_detail(&self, id: &str) -> Result<Option<AssetDetail>, GraphError> {
        let inner = self.inner.read().await;
        let Some(stored) = inner.assets.get(id) else {
            return Ok(None);
        };
        let inbound_edges = inner
            .edges
            .iter()
            .filter(|e| e.target == id)
            .cloned()
            .collect();
        let outbound_edges = inner
            .edges
            .iter()
            .filter(|e| e.source == id)
            .cloned()
            .collect();

        Ok(Some(AssetDetail {
            node: stored.node.clone(),
            inbound_edges,
            outbound_edges,
        }))
    }

    async fn asset_stats(&self) -> Result<Vec<KindCount>, GraphError> {
        let inner = self.inner.read().await;
        let mut counts: BTreeMap<AssetKind, u64> = BTreeMap::new();
        for asset in inner.assets.values() {
            *counts.entry(asset.node.kind).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(kind, total)| KindCount { kind, total })
            .collect())
    }
}
