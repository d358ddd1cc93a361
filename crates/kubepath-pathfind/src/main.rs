//! CLI entry point for the kubepath-pathfind attack path search.
//!
//! Reads a JSON search request from stdin and writes JSON results to stdout.
//! Asset browsing commands take their filters as flags.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use kubepath_core::config::KubepathConfig;
use kubepath_core::AssetKind;
use kubepath_graph::{AssetFilter, GraphClient, GraphConfig, GraphStore, HealthStatus};
use kubepath_pathfind::{PathSearchEngine, SearchRequest, SearchResponse};

#[derive(Parser)]
#[command(name = "kubepath-pathfind")]
#[command(about = "Attack path search over the kubepath attack graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: kubepath).
    #[arg(short, long, default_value = "kubepath", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Search for ranked attack paths (reads JSON from stdin).
    Search,
    /// List stored assets, newest first.
    Assets {
        #[arg(long)]
        kind: Option<AssetKind>,
        /// Namespace substring.
        #[arg(long)]
        namespace: Option<String>,
        /// Name substring or exact id.
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 25)]
        page_size: u32,
    },
    /// Show one asset with its inbound and outbound edges.
    Asset {
        #[arg(long)]
        id: String,
    },
    /// Count stored assets per kind.
    Stats,
    /// Report whether Neo4j is reachable, with its version.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = KubepathConfig::load(&cli.config)?;

    let graph_config = GraphConfig::from(&config.neo4j);

    if let Command::Health = cli.command {
        let health = match GraphClient::connect(&graph_config).await {
            Ok(graph) => graph.health().await,
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                HealthStatus::down()
            }
        };
        println!("{}", serde_json::to_string(&health)?);
        return Ok(());
    }

    let graph = GraphClient::connect(&graph_config).await?;
    run(PathSearchEngine::new(graph), cli.command).await
}

async fn run<S: GraphStore>(engine: PathSearchEngine<S>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Search => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: SearchRequest = serde_json::from_str(&input)?;
            let paths = engine.search(&request).await?;
            println!("{}", serde_json::to_string(&SearchResponse { paths })?);
        }
        Command::Assets {
            kind,
            namespace,
            search,
            page,
            page_size,
        } => {
            let filter = AssetFilter {
                kind,
                namespace,
                search,
                page,
                page_size,
            };
            let result = engine.store().list_assets(&filter).await?;
            println!("{}", serde_json::to_string(&result)?);
        }
        Command::Asset { id } => match engine.store().asset_detail(&id).await? {
            Some(detail) => println!("{}", serde_json::to_string(&detail)?),
            None => anyhow::bail!("Asset not found: {id}"),
        },
        Command::Stats => {
            let counts = engine.store().asset_stats().await?;
            println!("{}", serde_json::to_string(&counts)?);
        }
        Command::Health => anyhow::bail!("health is answered before a store is opened"),
    }

    Ok(())
}
