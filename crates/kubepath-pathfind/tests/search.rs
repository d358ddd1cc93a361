//! End-to-end search: build a cluster graph, persist it, search it.

use chrono::Utc;

use kubepath_core::{AssetKind, IngestionMode, Technique};
use kubepath_graph::{persist_graph, MemoryStore};
use kubepath_ingest::{build_graph, ClusterResources};
use kubepath_pathfind::{PathSearchEngine, SearchRequest};

const CLUSTER: &str = r#"{
    "nodes": [{"metadata": {"name": "worker-1"}}],
    "serviceAccounts": [{"metadata": {"name": "sa1", "namespace": "ns1"},
                         "secrets": [{"name": "tok1"}]}],
    "secrets": [{"metadata": {"name": "tok1", "namespace": "ns1"},
                 "type": "kubernetes.io/service-account-token"}],
    "pods": [{"metadata": {"name": "web", "namespace": "ns1"},
              "spec": {"nodeName": "worker-1", "serviceAccountName": "sa1",
                       "containers": [{"name": "app", "image": "nginx"}]}}]
}"#;

async fn ingested() -> PathSearchEngine<MemoryStore> {
    let resources: ClusterResources = serde_json::from_str(CLUSTER).unwrap();
    let snapshot = build_graph("c1", &resources, Utc::now());
    let store = MemoryStore::new();
    persist_graph(&store, snapshot, "c1", IngestionMode::Full)
        .await
        .unwrap();
    PathSearchEngine::new(store)
}

fn pod_to_master(max_depth: usize) -> SearchRequest {
    SearchRequest {
        start_kind: Some(AssetKind::Pod),
        target_kind: Some(AssetKind::Master),
        max_depth,
        ..Default::default()
    }
}

#[tokio::test]
async fn pod_reaches_master_through_token() {
    let engine = ingested().await;
    let paths = engine.search(&pod_to_master(4)).await.unwrap();
    assert_eq!(paths.len(), 1);

    let path = &paths[0];
    assert_eq!(path.hop_count(), 4);
    assert_eq!(path.summary, "web → c1-master (4 hops)");

    let ids: Vec<&str> = path.steps.iter().map(|s| s.nodes[0].id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "c1:pod:ns1:web",
            "c1:serviceaccount:ns1:sa1",
            "c1:secret:ns1:tok1",
            "c1:secret:ns1:tok1:credential",
            "c1:master:global:api-server",
        ]
    );
    let techniques: Vec<Technique> = path.steps[1..]
        .iter()
        .map(|s| s.edges[0].technique)
        .collect();
    assert_eq!(
        techniques,
        vec![
            Technique::PrivilegeDiscovery,
            Technique::ClusterCredentialAccess,
            Technique::ClusterCredentialAccess,
            Technique::ClusterCredentialAccess,
        ]
    );
    // (0.6 + 1.0) + (0.7 + 2.0) + (0.7 + 2.0) + (0.8 + 2.0)
    assert_eq!(path.score, 9.8);
}

#[tokio::test]
async fn shallow_search_finds_nothing() {
    let engine = ingested().await;
    let paths = engine.search(&pod_to_master(3)).await.unwrap();
    assert!(paths.is_empty());
}

#[tokio::test]
async fn node_start_reaches_pod_contents() {
    let engine = ingested().await;
    let request = SearchRequest {
        start_node_id: Some("c1:node:global:worker-1".to_string()),
        target_kind: Some(AssetKind::Master),
        max_depth: 5,
        ..Default::default()
    };
    let paths = engine.search(&request).await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].hop_count(), 5);
    assert_eq!(paths[0].steps[1].edges[0].technique, Technique::NodeRootAccess);
}
