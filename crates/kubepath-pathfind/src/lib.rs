//! kubepath-pathfind: Attack path search over the stored attack graph.
//!
//! Validates a search request, delegates the bounded traversal to a
//! [`GraphStore`], then ranks the candidate paths and shapes each one into
//! depth-indexed steps with a human-readable summary.

pub mod error;
pub mod types;

pub use error::PathfindError;
pub use types::{SearchRequest, SearchResponse};

use std::cmp::Ordering;
use std::time::Instant;

use kubepath_core::scoring::round_score;
use kubepath_core::{AttackPath, AttackStep};
use kubepath_graph::{GraphStore, StoredPath};
use uuid::Uuid;

/// Bounded attack path search over a graph store.
pub struct PathSearchEngine<S> {
    store: S,
}

impl<S: GraphStore> PathSearchEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store, for asset browsing alongside searches.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Search for the highest-scoring attack paths matching `request`.
    ///
    /// Paths are ordered by descending score; equal scores keep the order
    /// the store returned them in. An empty result is not an error.
    pub async fn search(&self, request: &SearchRequest) -> error::Result<Vec<AttackPath>> {
        let start = Instant::now();
        let query = request.validate()?;

        let mut candidates = self.store.find_paths(&query).await?;
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates.truncate(query.limit);

        let paths: Vec<AttackPath> = candidates.into_iter().filter_map(assemble_path).collect();

        tracing::info!(
            start_node = ?query.start_node_id,
            start_kind = ?query.start_kind,
            target_kind = ?query.target_kind,
            max_depth = query.max_depth,
            paths = paths.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Attack path search complete"
        );
        Ok(paths)
    }
}

/// Shape a stored path into steps: depth 0 holds the start node, depth k
/// holds the k-th edge and the node it reaches.
fn assemble_path(stored: StoredPath) -> Option<AttackPath> {
    if stored.nodes.len() != stored.edges.len() + 1 {
        tracing::warn!(
            nodes = stored.nodes.len(),
            edges = stored.edges.len(),
            "Skipping malformed path from store"
        );
        return None;
    }

    let summary = format!(
        "{} → {} ({} hops)",
        stored.nodes.first()?.name,
        stored.nodes.last()?.name,
        stored.edges.len()
    );

    let mut nodes = stored.nodes.into_iter();
    let mut steps = Vec::with_capacity(stored.edges.len() + 1);
    steps.push(AttackStep {
        depth: 0,
        nodes: vec![nodes.next()?],
        edges: Vec::new(),
    });
    for (i, (edge, node)) in stored.edges.into_iter().zip(nodes).enumerate() {
        steps.push(AttackStep {
            depth: i + 1,
            nodes: vec![node],
            edges: vec![edge],
        });
    }

    Some(AttackPath {
        id: Uuid::new_v4(),
        score: round_score(stored.score),
        steps,
        summary,
    })
}
