//! The property-graph contract kubepath needs from a graph store.
//!
//! Two implementations exist: [`GraphClient`] (Neo4j) and
//! [`MemoryStore`](crate::memory::MemoryStore). Stores are constructed
//! explicitly and handed to the ingestion pipeline and the search engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kubepath_core::{AssetKind, AssetNode, AttackEdge};

use crate::client::{GraphClient, GraphError};

/// A bounded traversal request, already validated by the caller.
#[derive(Debug, Clone, Default)]
pub struct PathQuery {
    pub start_node_id: Option<String>,
    pub start_kind: Option<AssetKind>,
    pub target_kind: Option<AssetKind>,
    /// Applies to both the start and the end of a path.
    pub namespace: Option<String>,
    /// Maximum hop count (inclusive).
    pub max_depth: usize,
    pub limit: usize,
}

/// A path as returned by a store: `nodes.len() == edges.len() + 1`.
#[derive(Debug, Clone)]
pub struct StoredPath {
    pub nodes: Vec<AssetNode>,
    pub edges: Vec<AttackEdge>,
    /// Unrounded additive score.
    pub score: f64,
}

/// Filter for paginated asset listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFilter {
    pub kind: Option<AssetKind>,
    /// Substring match on the namespace.
    pub namespace: Option<String>,
    /// Case-insensitive substring of the name, or an exact id.
    pub search: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    25
}

impl Default for AssetFilter {
    fn default() -> Self {
        Self {
            kind: None,
            namespace: None,
            search: None,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl AssetFilter {
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Rows to skip for the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    pub items: Vec<AssetNode>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// One asset with every edge touching it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetDetail {
    pub node: AssetNode,
    pub inbound_edges: Vec<AttackEdge>,
    pub outbound_edges: Vec<AttackEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: AssetKind,
    pub total: u64,
}

/// Storage and traversal operations over the attack graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Delete every asset tagged with `cluster`, with its relationships.
    /// Returns the number of deleted assets.
    async fn delete_cluster(&self, cluster: &str) -> Result<u64, GraphError>;

    /// Upsert assets by id, overwriting all stored fields and tagging them with `cluster`.
    async fn upsert_nodes(&self, cluster: &str, nodes: &[AssetNode]) -> Result<u64, GraphError>;

    /// Upsert edges by `(source, target, technique)`. Edges whose endpoints are
    /// not stored are dropped; the return value counts only written edges.
    async fn upsert_edges(&self, edges: &[AttackEdge]) -> Result<u64, GraphError>;

    /// Enumerate and score paths, best first, at most `query.limit`.
    async fn find_paths(&self, query: &PathQuery) -> Result<Vec<StoredPath>, GraphError>;

    /// Every asset tagged with `cluster`.
    async fn list_cluster_assets(&self, cluster: &str) -> Result<Vec<AssetNode>, GraphError>;

    async fn list_assets(&self, filter: &AssetFilter) -> Result<AssetPage, GraphError>;

    async fn asset_detail(&self, id: &str) -> Result<Option<AssetDetail>, GraphError>;

    /// Asset counts per kind.
    async fn asset_stats(&self) -> Result<Vec<KindCount>, GraphError>;
}

#[async_trait]
impl GraphStore for GraphClient {
    async fn delete_cluster(&self, cluster: &str) -> Result<u64, GraphError> {
        self.delete_cluster_assets(cluster).await
    }

    async fn upsert_nodes(&self, cluster: &str, nodes: &[AssetNode]) -> Result<u64, GraphError> {
        self.upsert_asset_batch(cluster, nodes).await
    }

    async fn upsert_edges(&self, edges: &[AttackEdge]) -> Result<u64, GraphError> {
        self.upsert_edge_batch(edges).await
    }

    async fn find_paths(&self, query: &PathQuery) -> Result<Vec<StoredPath>, GraphError> {
        self.search_paths(query).await
    }

    async fn list_cluster_assets(&self, cluster: &str) -> Result<Vec<AssetNode>, GraphError> {
        self.cluster_assets(cluster).await
    }

    async fn list_assets(&self, filter: &AssetFilter) -> Result<AssetPage, GraphError> {
        self.asset_page(filter).await
    }

    async fn asset_detail(&self, id: &str) -> Result<Option<AssetDetail>, GraphError> {
        self.get_asset_detail(id).await
    }

    async fn asset_stats(&self) -> Result<Vec<KindCount>, GraphError> {
        self.count_by_kind().await
    }
}
