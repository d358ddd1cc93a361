//! Error types for the kubepath-ingest crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    /// The cluster (or snapshot) could not be reached at all. Fatal for the job.
    #[error("Cluster unreachable: {reason}")]
    Unreachable { reason: String },

    /// Listing one resource kind failed. Recovered by the collector.
    #[error("Failed to list {kind}: {reason}")]
    Listing { kind: String, reason: String },

    #[error("Invalid snapshot file: {0}")]
    Snapshot(String),

    #[error("Graph error: {0}")]
    Graph(#[from] kubepath_graph::GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Job {0} not found")]
    JobNotFound(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
