//! Neo4j connection management and shared graph client.

use chrono::{DateTime, Utc};
use kubepath_core::config::Neo4jSettings;
use neo4rs::{query, ConfigBuilder, Graph, Query};
use serde::Serialize;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    #[error("Neo4j query error: {0}")]
    Query(#[from] neo4rs::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Graph configuration error: {0}")]
    Config(String),
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::from(&Neo4jSettings::default())
    }
}

impl From<&Neo4jSettings> for GraphConfig {
    fn from(settings: &Neo4jSettings) -> Self {
        Self {
            uri: settings.uri.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
            max_connections: settings.max_connections,
            fetch_size: settings.fetch_size,
        }
    }
}

/// Result of a database health check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    /// `up` or `down`.
    pub neo4j: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthStatus {
    pub fn up(version: impl Into<String>) -> Self {
        Self {
            neo4j: "up".to_string(),
            version: version.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn down() -> Self {
        Self {
            neo4j: "down".to_string(),
            version: "unknown".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_up(&self) -> bool {
        self.neo4j == "up"
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// Owns its own connection pool; construct one per process and pass it to
/// whoever needs graph access. Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let mut builder = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size);
        if let Some(db) = &config.database {
            builder = builder.db(db.as_str());
        }
        let neo_config = builder
            .build()
            .map_err(|e| GraphError::Config(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Execute a write-only query (CREATE, MERGE, DELETE, SET).
    pub async fn run(&self, query: Query) -> Result<(), GraphError> {
        self.graph.run(query).await?;
        Ok(())
    }

    /// Execute a query and collect all rows.
    pub async fn query_rows(&self, query: Query) -> Result<Vec<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Execute a query and return the first row, if any.
    pub async fn query_one(&self, query: Query) -> Result<Option<neo4rs::Row>, GraphError> {
        let mut stream = self.graph.execute(query).await?;
        Ok(stream.next().await?)
    }

    /// Ask the server for its components. Failures report `down`, never an error.
    pub async fn health(&self) -> HealthStatus {
        let q = query(
            "CALL dbms.components() YIELD name, versions
             RETURN name, versions",
        );
        match self.query_one(q).await {
            Ok(Some(row)) => {
                let version = row
                    .get::<Vec<String>>("versions")
                    .ok()
                    .and_then(|v| v.into_iter().next())
                    .unwrap_or_else(|| "unknown".to_string());
                HealthStatus::up(version)
            }
            Ok(None) => HealthStatus::down(),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                HealthStatus::down()
            }
        }
    }

    /// Execute a query that returns a single count column.
    pub(crate) async fn query_count(&self, query: Query, column: &str) -> Result<u64, GraphError> {
        match self.query_one(query).await? {
            Some(row) => Ok(row.get::<i64>(column).unwrap_or(0).max(0) as u64),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_wire_shape() {
        let down = HealthStatus::down();
        assert!(!down.is_up());
        let value = serde_json::to_value(&down).unwrap();
        assert_eq!(value["neo4j"], "down");
        assert_eq!(value["version"], "unknown");
        assert!(value["timestamp"].is_string());

        let up = HealthStatus::up("5.20.0");
        assert!(up.is_up());
        assert_eq!(up.version, "5.20.0");
    }

    #[test]
    fn config_follows_settings() {
        let config = GraphConfig::default();
        assert_eq!(config.uri, Neo4jSettings::default().uri);
        assert_eq!(config.max_connections, Neo4jSettings::default().max_connections);
    }
}
