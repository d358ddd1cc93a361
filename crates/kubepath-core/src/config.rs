//! Configuration management for kubepath services.
//!
//! Configuration is loaded from (in priority order):
//! 1. Environment variables (`KUBEPATH__` prefix, `__` separator)
//! 2. Config file (`kubepath.toml`, optional)
//! 3. Defaults

use serde::Deserialize;

use crate::error::KubepathError;

/// Top-level configuration shared by the kubepath binaries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KubepathConfig {
    #[serde(default)]
    pub neo4j: Neo4jSettings,

    #[serde(default)]
    pub ingest: IngestSettings,
}

/// Connection settings for the Neo4j graph store.
#[derive(Debug, Clone, Deserialize)]
pub struct Neo4jSettings {
    #[serde(default = "default_uri")]
    pub uri: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Target database; the server default when unset.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_fetch_size")]
    pub fetch_size: usize,
}

/// Settings for collection and persistence.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    /// Path to the kubectl binary (default: "kubectl").
    #[serde(default = "default_kubectl_path")]
    pub kubectl_path: String,

    /// Finished jobs older than this are evicted from the job table.
    #[serde(default = "default_retention_hours")]
    pub job_retention_hours: u64,

    #[serde(default = "default_node_batch")]
    pub node_batch_size: usize,

    #[serde(default = "default_edge_batch")]
    pub edge_batch_size: usize,
}

fn default_uri() -> String {
    "bolt://localhost:7687".to_string()
}

fn default_user() -> String {
    "neo4j".to_string()
}

fn default_password() -> String {
    "kubepath-dev".to_string()
}

fn default_max_connections() -> u32 {
    16
}

fn default_fetch_size() -> usize {
    256
}

fn default_kubectl_path() -> String {
    "kubectl".to_string()
}

fn default_retention_hours() -> u64 {
    24
}

fn default_node_batch() -> usize {
    100
}

fn default_edge_batch() -> usize {
    200
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            user: default_user(),
            password: default_password(),
            database: None,
            max_connections: default_max_connections(),
            fetch_size: default_fetch_size(),
        }
    }
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            kubectl_path: default_kubectl_path(),
            job_retention_hours: default_retention_hours(),
            node_batch_size: default_node_batch(),
            edge_batch_size: default_edge_batch(),
        }
    }
}

impl KubepathConfig {
    /// Load from `{file_prefix}.toml` (if present) overlaid by `KUBEPATH__*` variables.
    pub fn load(file_prefix: &str) -> Result<Self, KubepathError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("KUBEPATH")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: KubepathConfig = cfg.try_deserialize()?;
        if loaded.ingest.node_batch_size == 0 || loaded.ingest.edge_batch_size == 0 {
            return Err(KubepathError::Config(
                "ingest batch sizes must be greater than zero".to_string(),
            ));
        }
        Ok(loaded)
    }
}
