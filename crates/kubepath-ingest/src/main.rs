//! CLI entry point for kubepath-ingest.

use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use kubepath_core::config::KubepathConfig;
use kubepath_core::{AssetKind, IngestionMode};
use kubepath_graph::{GraphClient, GraphConfig, PersistOptions};

use kubepath_ingest::collect::collect_resources;
use kubepath_ingest::{
    build_graph, spawn_ingestion, ClusterSource, JobStore, KubectlSource, SnapshotFileSource,
};

#[derive(Parser)]
#[command(name = "kubepath-ingest")]
#[command(about = "Ingest a Kubernetes cluster into the kubepath attack graph")]
struct Cli {
    /// Kubeconfig used to reach the cluster through kubectl.
    #[arg(long, conflicts_with = "snapshot", required_unless_present = "snapshot")]
    kubeconfig: Option<String>,

    /// Recorded cluster snapshot (JSON) to ingest instead of a live cluster.
    #[arg(long)]
    snapshot: Option<String>,

    /// Cluster name; tags every stored asset and prefixes asset ids.
    #[arg(long)]
    cluster: String,

    /// Ingestion mode: full, incremental.
    #[arg(short, long, default_value = "full")]
    mode: String,

    /// Build the graph and print a summary without writing to Neo4j.
    #[arg(long)]
    dry_run: bool,

    /// Config file prefix (default: kubepath).
    #[arg(short, long, default_value = "kubepath")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = KubepathConfig::load(&cli.config)?;
    let mode: IngestionMode = cli.mode.parse()?;

    let source: Arc<dyn ClusterSource> = match (&cli.kubeconfig, &cli.snapshot) {
        (_, Some(path)) => Arc::new(SnapshotFileSource::new(path)),
        (Some(path), None) => Arc::new(KubectlSource::new(&config.ingest.kubectl_path, path)),
        (None, None) => anyhow::bail!("Specify --kubeconfig or --snapshot"),
    };

    if cli.dry_run {
        let collection = collect_resources(source.as_ref()).await?;
        let snapshot = build_graph(&cli.cluster, &collection.resources, Utc::now());
        let kinds: serde_json::Map<String, serde_json::Value> = AssetKind::ALL
            .iter()
            .map(|k| (k.as_str().to_string(), json!(snapshot.count_kind(*k))))
            .collect();
        let summary = json!({
            "cluster": snapshot.cluster,
            "assets": snapshot.asset_count(),
            "edges": snapshot.edge_count(),
            "kinds": kinds,
            "failedKinds": collection.failed_kinds,
            "digest": snapshot.digest(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let graph = GraphClient::connect(&GraphConfig::from(&config.neo4j)).await?;
    let jobs = JobStore::new(config.ingest.job_retention_hours);
    let (job, handle) = spawn_ingestion(
        source,
        Arc::new(graph),
        cli.cluster.clone(),
        mode,
        PersistOptions::from(&config.ingest),
        jobs.clone(),
    );
    tracing::info!(job_id = %job.id, cluster = %cli.cluster, "Ingestion job queued");

    let outcome = handle.await?;
    let record = jobs.get(job.id)?;
    println!("{}", serde_json::to_string_pretty(&record)?);

    let report = outcome?;
    tracing::info!(
        job_id = %report.job_id,
        assets = report.assets,
        edges = report.persisted.edges_written,
        digest = %report.digest,
        "Done"
    );
    Ok(())
}
