//! One ingestion job: collect → build → persist, reported through the job table.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use uuid::Uuid;

use kubepath_core::IngestionMode;
use kubepath_graph::{persist_graph_with, GraphStore, PersistOptions, PersistSummary};

use crate::builder::build_graph;
use crate::collect::collect_resources;
use crate::error::Result;
use crate::jobs::{IngestionJob, JobStatus, JobStore};
use crate::source::ClusterSource;

/// What a successful job produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionReport {
    pub job_id: Uuid,
    pub cluster: String,
    pub assets: usize,
    pub edges: usize,
    pub failed_kinds: Vec<String>,
    pub digest: String,
    pub persisted: PersistSummary,
}

/// Run a job with the default batch sizes.
pub async fn run_ingestion(
    source: &dyn ClusterSource,
    store: &dyn GraphStore,
    cluster: &str,
    mode: IngestionMode,
    jobs: &JobStore,
    job_id: Uuid,
) -> Result<IngestionReport> {
    run_ingestion_with(source, store, cluster, mode, &PersistOptions::default(), jobs, job_id).await
}

/// Run a job that was already registered in `jobs`.
///
/// Any error ends the job `failed` with the cause as its last log line and
/// is also returned to the caller. A connect failure happens before anything
/// is written.
pub async fn run_ingestion_with(
    source: &dyn ClusterSource,
    store: &dyn GraphStore,
    cluster: &str,
    mode: IngestionMode,
    options: &PersistOptions,
    jobs: &JobStore,
    job_id: Uuid,
) -> Result<IngestionReport> {
    let start = Instant::now();
    tracing::info!(job_id = %job_id, cluster, source = %source.describe(), "Starting ingestion job");
    jobs.update_status(job_id, JobStatus::Running)?;

    match execute(source, store, cluster, mode, options, jobs, job_id).await {
        Ok(report) => {
            jobs.update_status(job_id, JobStatus::Succeeded)?;
            tracing::info!(
                job_id = %job_id,
                cluster,
                assets = report.assets,
                edges = report.persisted.edges_written,
                duration_ms = start.elapsed().as_millis() as u64,
                "Ingestion job succeeded"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, cluster, error = %e, "Ingestion job failed");
            jobs.append_log(job_id, &format!("Failed: {e}"))?;
            jobs.update_status(job_id, JobStatus::Failed)?;
            Err(e)
        }
    }
}

async fn execute(
    source: &dyn ClusterSource,
    store: &dyn GraphStore,
    cluster: &str,
    mode: IngestionMode,
    options: &PersistOptions,
    jobs: &JobStore,
    job_id: Uuid,
) -> Result<IngestionReport> {
    jobs.append_log(job_id, "Connecting to cluster")?;
    let collection = collect_resources(source).await?;
    for kind in &collection.failed_kinds {
        jobs.append_log(job_id, &format!("Listing {kind} failed; continuing without it"))?;
    }

    let snapshot = build_graph(cluster, &collection.resources, Utc::now());
    let assets = snapshot.asset_count();
    let edges = snapshot.edge_count();
    let digest = snapshot.digest();
    jobs.append_log(job_id, &format!("Collected {assets} assets"))?;

    let persisted = persist_graph_with(store, snapshot, cluster, mode, options).await?;
    jobs.append_log(job_id, "Graph write completed")?;

    Ok(IngestionReport {
        job_id,
        cluster: cluster.to_string(),
        assets,
        edges,
        failed_kinds: collection.failed_kinds,
        digest,
        persisted,
    })
}

/// Register a job and run it on a background task.
pub fn spawn_ingestion(
    source: Arc<dyn ClusterSource>,
    store: Arc<dyn GraphStore>,
    cluster: String,
    mode: IngestionMode,
    options: PersistOptions,
    jobs: JobStore,
) -> (IngestionJob, JoinHandle<Result<IngestionReport>>) {
    let job = jobs.create(&cluster, &source.describe(), mode);
    let job_id = job.id;
    let handle = tokio::spawn(async move {
        run_ingestion_with(
            source.as_ref(),
            store.as_ref(),
            &cluster,
            mode,
            &options,
            &jobs,
            job_id,
        )
        .await
    });
    (job, handle)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use kubepath_graph::MemoryStore;

    use super::*;
    use crate::error::IngestError;
    use crate::source::SnapshotFileSource;

    const SNAPSHOT: &str = r#"{
        "nodes": [{"metadata": {"name": "worker-1", "uid": "n-1"}}],
        "serviceAccounts": [{"metadata": {"name": "sa1", "namespace": "ns1"},
                             "secrets": [{"name": "tok1"}]}],
        "secrets": [{"metadata": {"name": "tok1", "namespace": "ns1"},
                     "type": "kubernetes.io/service-account-token"}],
        "pods": [{"metadata": {"name": "web", "namespace": "ns1"},
                  "spec": {"nodeName": "worker-1", "serviceAccountName": "sa1",
                           "containers": [{"name": "app", "image": "nginx"}]}}]
    }"#;

    fn snapshot_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn job_runs_to_success() {
        let file = snapshot_file();
        let source = SnapshotFileSource::new(file.path());
        let store = MemoryStore::new();
        let jobs = JobStore::default();
        let job = jobs.create("c1", &source.describe(), IngestionMode::Full);

        let report = run_ingestion(&source, &store, "c1", IngestionMode::Full, &jobs, job.id)
            .await
            .unwrap();
        // master, node, sa, secret, credential, pod, container
        assert_eq!(report.assets, 7);
        assert_eq!(report.persisted.nodes_written, 7);
        assert_eq!(report.persisted.edges_written as usize, report.edges);
        assert_eq!(store.asset_count().await, 7);

        let record = jobs.get(job.id).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert!(record.logs.iter().any(|l| l.ends_with("Collected 7 assets")));
        assert!(record.logs.last().unwrap().ends_with("Graph write completed"));
    }

    #[tokio::test]
    async fn unreachable_source_fails_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let source = SnapshotFileSource::new(dir.path().join("missing.json"));
        let store = MemoryStore::new();
        let jobs = JobStore::default();
        let job = jobs.create("c1", &source.describe(), IngestionMode::Full);

        let err = run_ingestion(&source, &store, "c1", IngestionMode::Full, &jobs, job.id)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Unreachable { .. }));
        assert_eq!(store.asset_count().await, 0);

        let record = jobs.get(job.id).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.finished_at.is_some());
        assert!(record.logs.last().unwrap().contains("Failed: Cluster unreachable"));
    }

    #[tokio::test]
    async fn unreadable_resource_does_not_fail_job() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{
                "nodes": [{"metadata": {"name": "worker-1"}}],
                "pods": [{"metadata": {"name": "web", "namespace": "ns1"},
                          "spec": {"containers": [{"name": "app"}]}},
                         {"metadata": {"name": "broken", "namespace": "ns1"},
                          "spec": {"containers": [{"image": "nginx"}]}}]
            }"#,
        )
        .unwrap();
        let source = SnapshotFileSource::new(file.path());
        let store = MemoryStore::new();
        let jobs = JobStore::default();
        let job = jobs.create("c1", &source.describe(), IngestionMode::Full);

        let report = run_ingestion(&source, &store, "c1", IngestionMode::Full, &jobs, job.id)
            .await
            .unwrap();
        // master, node, pod, container
        assert_eq!(report.assets, 4);
        assert_eq!(store.asset_count().await, 4);
        assert_eq!(store.cluster_of("c1:pod:ns1:web").await.as_deref(), Some("c1"));
        assert!(store.cluster_of("c1:pod:ns1:broken").await.is_none());
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn spawned_job_completes() {
        let file = snapshot_file();
        let source: Arc<dyn ClusterSource> = Arc::new(SnapshotFileSource::new(file.path()));
        let store = Arc::new(MemoryStore::new());
        let jobs = JobStore::default();

        let (job, handle) = spawn_ingestion(
            source,
            store.clone(),
            "c1".to_string(),
            IngestionMode::Incremental,
            PersistOptions::default(),
            jobs.clone(),
        );
        assert_eq!(job.status, JobStatus::Queued);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.job_id, job.id);
        assert_eq!(jobs.get(job.id).unwrap().status, JobStatus::Succeeded);
        assert_eq!(store.asset_count().await, 7);
    }
}
