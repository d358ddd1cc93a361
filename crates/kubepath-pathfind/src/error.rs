//! Error types for the kubepath-pathfind crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathfindError {
    /// The request was rejected before any traversal.
    #[error("Invalid search request: {0}")]
    InvalidRequest(String),

    #[error("Graph error: {0}")]
    Graph(#[from] kubepath_graph::GraphError),
}

pub type Result<T> = std::result::Result<T, PathfindError>;
