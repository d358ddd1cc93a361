//! kubepath-core: Shared types, configuration, and error handling for kubepath.
//!
//! This crate provides the foundational types used across all kubepath components:
//! - Asset kinds (Pod, Secret, ServiceAccount, etc.) for the attack graph
//! - Attack techniques and edges between assets
//! - Stable identity and dedup keys for assets and edges
//! - The path scoring weights shared by every graph store
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod keys;
pub mod scoring;
pub mod snapshot;
pub mod types;

pub use error::KubepathError;
pub use snapshot::GraphSnapshot;
pub use types::{
    AssetKind, AssetNode, AttackEdge, AttackPath, AttackStep, Attributes, Criticality,
    IngestionMode, Technique,
};
