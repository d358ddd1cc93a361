//! kubepath-graph: Storage adapter for the Kubernetes attack graph.
//!
//! Every read and write of the persisted graph goes through the
//! [`GraphStore`] trait. [`GraphClient`] talks to Neo4j; [`MemoryStore`]
//! keeps the same semantics in process.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod persist;
pub mod queries;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError, HealthStatus};
pub use memory::MemoryStore;
pub use persist::{persist_graph, persist_graph_with, PersistOptions, PersistSummary};
pub use store::{AssetDetail, AssetFilter, AssetPage, GraphStore, KindCount, PathQuery, StoredPath};
