//! Per-kind resource collection with failure isolation.

use crate::error::Result;
use crate::resources::ClusterResources;
use crate::source::ClusterSource;

/// Outcome of one collection pass.
#[derive(Debug, Default)]
pub struct Collection {
    pub resources: ClusterResources,
    /// Kinds whose listing failed and were treated as empty.
    pub failed_kinds: Vec<String>,
}

/// Connect, then list every kind in a fixed order.
///
/// A failing `connect` aborts before any listing. A failing listing is
/// logged and recorded in [`Collection::failed_kinds`]; the other kinds are
/// still collected.
pub async fn collect_resources(source: &dyn ClusterSource) -> Result<Collection> {
    source.connect().await?;
    tracing::info!(source = %source.describe(), "Connected to cluster");

    let mut collection = Collection::default();

    collection.resources.nodes = recover("nodes", source.list_nodes().await, &mut collection);
    collection.resources.service_accounts = recover(
        "serviceaccounts",
        source.list_service_accounts().await,
        &mut collection,
    );
    collection.resources.secrets = recover("secrets", source.list_secrets().await, &mut collection);
    collection.resources.pods = recover("pods", source.list_pods().await, &mut collection);

    tracing::info!(
        nodes = collection.resources.nodes.len(),
        service_accounts = collection.resources.service_accounts.len(),
        secrets = collection.resources.secrets.len(),
        pods = collection.resources.pods.len(),
        failed = collection.failed_kinds.len(),
        "Collection complete"
    );
    Ok(collection)
}

fn recover<T>(kind: &str, listed: Result<Vec<T>>, collection: &mut Collection) -> Vec<T> {
    match listed {
        Ok(items) => items,
        Err(e) => {
            tracing::error!(kind, error = %e, "Failed to list resources, continuing without them");
            collection.failed_kinds.push(kind.to_string());
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::IngestError;
    use crate::resources::{ClusterNode, ObjectMeta, Pod, Secret, ServiceAccount};

    struct FlakySource {
        reachable: bool,
        failing_secrets: bool,
    }

    fn meta(name: &str) -> Option<ObjectMeta> {
        Some(ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("ns1".to_string()),
            ..Default::default()
        })
    }

    #[async_trait]
    impl ClusterSource for FlakySource {
        fn describe(&self) -> String {
            "flaky".to_string()
        }

        async fn connect(&self) -> Result<()> {
            if self.reachable {
                Ok(())
            } else {
                Err(IngestError::Unreachable {
                    reason: "connection refused".to_string(),
                })
            }
        }

        async fn list_nodes(&self) -> Result<Vec<ClusterNode>> {
            Ok(vec![ClusterNode {
                metadata: meta("worker-1"),
                status: None,
            }])
        }

        async fn list_service_accounts(&self) -> Result<Vec<ServiceAccount>> {
            Ok(Vec::new())
        }

        async fn list_secrets(&self) -> Result<Vec<Secret>> {
            if self.failing_secrets {
                Err(IngestError::Listing {
                    kind: "secrets".to_string(),
                    reason: "forbidden".to_string(),
                })
            } else {
                Ok(vec![Secret {
                    metadata: meta("tok1"),
                    secret_type: None,
                }])
            }
        }

        async fn list_pods(&self) -> Result<Vec<Pod>> {
            Ok(vec![Pod {
                metadata: meta("web"),
                spec: None,
            }])
        }
    }

    #[tokio::test]
    async fn failing_kind_is_empty_and_others_survive() {
        let source = FlakySource {
            reachable: true,
            failing_secrets: true,
        };
        let collection = collect_resources(&source).await.unwrap();
        assert!(collection.resources.secrets.is_empty());
        assert_eq!(collection.resources.nodes.len(), 1);
        assert_eq!(collection.resources.pods.len(), 1);
        assert_eq!(collection.failed_kinds, vec!["secrets".to_string()]);
    }

    #[tokio::test]
    async fn unreachable_cluster_aborts() {
        let source = FlakySource {
            reachable: false,
            failing_secrets: false,
        };
        let err = collect_resources(&source).await.unwrap_err();
        assert!(matches!(err, IngestError::Unreachable { .. }));
    }
}
