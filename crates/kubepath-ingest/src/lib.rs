//! kubepath-ingest: cluster collection and attack graph ingestion.
//!
//! Lists Kubernetes resources through `kubectl` (or a recorded snapshot
//! file), builds the typed attack graph, and persists it through a
//! [`GraphStore`](kubepath_graph::GraphStore), tracking each run in a job
//! table.

pub mod builder;
pub mod collect;
pub mod error;
pub mod jobs;
pub mod pipeline;
pub mod resources;
pub mod source;

pub use builder::{build_graph, GraphBuilder};
pub use error::IngestError;
pub use jobs::{IngestionJob, JobStatus, JobStore};
pub use pipeline::{run_ingestion, run_ingestion_with, spawn_ingestion, IngestionReport};
pub use resources::ClusterResources;
pub use source::{ClusterSource, KubectlSource, SnapshotFileSource};
