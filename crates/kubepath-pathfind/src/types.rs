//! Request and response types for attack path search.

use serde::{Deserialize, Serialize};

use kubepath_core::{AssetKind, AttackPath};
use kubepath_graph::PathQuery;

use crate::error::{PathfindError, Result};

pub const DEFAULT_MAX_DEPTH: usize = 6;
pub const MAX_DEPTH_LIMIT: usize = 8;
pub const DEFAULT_LIMIT: usize = 5;
pub const MAX_LIMIT: usize = 20;

/// Request to search for attack paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Exact id of the start asset.
    pub start_node_id: Option<String>,
    /// Kind of the start asset(s).
    #[serde(alias = "startType")]
    pub start_kind: Option<AssetKind>,
    /// Kind the path must end on; any asset when unset.
    #[serde(alias = "targetType")]
    pub target_kind: Option<AssetKind>,
    /// Namespace both ends of the path must be in.
    pub namespace: Option<String>,
    /// Maximum hop count, 1..=8 (default: 6).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Maximum number of paths returned, 1..=20 (default: 5).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            start_node_id: None,
            start_kind: None,
            target_kind: None,
            namespace: None,
            max_depth: DEFAULT_MAX_DEPTH,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl SearchRequest {
    /// Check bounds and translate into a store query.
    pub fn validate(&self) -> Result<PathQuery> {
        let start_node_id = self.start_node_id.clone().filter(|id| !id.is_empty());
        if start_node_id.is_none() && self.start_kind.is_none() {
            return Err(PathfindError::InvalidRequest(
                "startNodeId or startKind is required".to_string(),
            ));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(PathfindError::InvalidRequest(format!(
                "maxDepth must be between 1 and {MAX_DEPTH_LIMIT}, got {}",
                self.max_depth
            )));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(PathfindError::InvalidRequest(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }

        Ok(PathQuery {
            start_node_id,
            start_kind: self.start_kind,
            target_kind: self.target_kind,
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
            max_depth: self.max_depth,
            limit: self.limit,
        })
    }
}

/// Ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub paths: Vec<AttackPath>,
}
