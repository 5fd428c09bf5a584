// src/bin/chatindex.rs
// CLI entry point. Mirrors the teacher's clap-derive `mira` binary shape,
// collapsed to subcommands instead of a REPL since this system has no
// interactive surface.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatindex_core::config::AppConfig;
use chatindex_core::embedder::remote::RemoteEmbedder;
use chatindex_core::embedder::Embedder;
use chatindex_core::gateway::events::InboundEvent;
use chatindex_core::gateway::GatewayIngestor;
use chatindex_core::jb::sqlite::SqliteJobBroker;
use chatindex_core::jb::JobBroker;
use chatindex_core::metrics::TaskMetrics;
use chatindex_core::reconciler::Reconciler;
use chatindex_core::rs::sqlite::SqliteRelationalStore;
use chatindex_core::rs::RelationalStore;
use chatindex_core::vs::qdrant::QdrantVectorStore;
use chatindex_core::vs::VectorStore;
use chatindex_core::worker::{IndexingWorker, RemoteVisionDescriber, VisionDescriber};

#[derive(Parser, Debug)]
#[command(name = "chatindex")]
#[command(author = "Conary Labs")]
#[command(version)]
#[command(about = "Ingestion and consistency engine for a chat-derived semantic knowledge base", long_about = None)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the indexing worker pool until terminated.
    Worker,
    /// Run the reconciler scheduler loop until terminated.
    Reconciler,
    /// Run the worker pool and reconciler together (the default production mode).
    Serve,
    /// Consume newline-delimited JSON inbound events from stdin and ingest them.
    Gateway,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!(command = ?args.command, "starting chatindex");

    let pool = connect_rs(&config).await?;
    let rs_impl = SqliteRelationalStore::new(pool.clone());
    rs_impl.run_migrations().await.context("running migrations")?;
    let rs: Arc<dyn RelationalStore> = Arc::new(rs_impl);
    let jb: Arc<dyn JobBroker> = Arc::new(SqliteJobBroker::new(pool, config.jobs.clone()));
    let metrics = Arc::new(TaskMetrics::new());

    match args.command {
        Command::Worker => {
            let (vs, embedder, vision) = connect_indexing_deps(&config).await?;
            run_worker(rs, vs, jb, embedder, vision, config, metrics).await?;
        }
        Command::Reconciler => {
            let vs = connect_vector_store(&config).await?;
            run_reconciler(rs, vs, jb, config, metrics).await?;
        }
        Command::Serve => {
            let (vs, embedder, vision) = connect_indexing_deps(&config).await?;
            let worker_handle = tokio::spawn(run_worker(
                rs.clone(),
                vs.clone(),
                jb.clone(),
                embedder,
                vision,
                config.clone(),
                metrics.clone(),
            ));
            let reconciler_handle = tokio::spawn(run_reconciler(rs, vs, jb, config, metrics));
            let (worker_result, reconciler_result) = tokio::join!(worker_handle, reconciler_handle);
            worker_result??;
            reconciler_result??;
        }
        Command::Gateway => run_gateway(rs, jb).await?,
    }

    Ok(())
}

async fn connect_rs(config: &AppConfig) -> Result<SqlitePool> {
    let connect_opts = SqliteConnectOptions::from_str(&config.database.url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_opts)
        .await
        .context("connecting to relational store")
}

async fn connect_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>> {
    let vs = QdrantVectorStore::new(
        &config.vector_store.url,
        &config.vector_store.collection,
        config.embedder.dimension,
        std::time::Duration::from_secs(config.vector_store.timeout_secs),
    )
    .await
    .context("connecting to vector store")?;
    Ok(Arc::new(vs))
}

async fn connect_indexing_deps(
    config: &AppConfig,
) -> Result<(Arc<dyn VectorStore>, Arc<dyn Embedder>, Arc<dyn VisionDescriber>)> {
    let vs = connect_vector_store(config).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(RemoteEmbedder::new(config.embedder.clone()));
    let vision: Arc<dyn VisionDescriber> = Arc::new(RemoteVisionDescriber::new(
        config.vision.clone(),
        std::time::Duration::from_secs(config.attachments.vision_timeout_secs),
    ));
    Ok((vs, embedder, vision))
}

async fn run_worker(
    rs: Arc<dyn RelationalStore>,
    vs: Arc<dyn VectorStore>,
    jb: Arc<dyn JobBroker>,
    embedder: Arc<dyn Embedder>,
    vision: Arc<dyn VisionDescriber>,
    config: AppConfig,
    metrics: Arc<TaskMetrics>,
) -> Result<()> {
    let worker = Arc::new(IndexingWorker::new(
        rs,
        vs,
        jb,
        embedder,
        vision,
        config.session.clone(),
        config.attachments.clone(),
        metrics,
    ));
    let handles = worker.spawn_pool(config.jobs.worker_concurrency);
    for handle in handles {
        handle.await.context("indexing worker executor panicked")?;
    }
    Ok(())
}

async fn run_reconciler(
    rs: Arc<dyn RelationalStore>,
    vs: Arc<dyn VectorStore>,
    jb: Arc<dyn JobBroker>,
    config: AppConfig,
    metrics: Arc<TaskMetrics>,
) -> Result<()> {
    let reconciler = Arc::new(Reconciler::new(rs, vs, jb, config.reconciler.clone(), metrics));
    reconciler.spawn().await.context("reconciler scheduler panicked")?;
    Ok(())
}

/// Reads newline-delimited JSON `InboundEvent`s from stdin until EOF. The
/// concrete platform transport (websocket, webhook relay) lives outside this
/// engine; this subcommand is the thin adapter a real deployment pipes
/// translated events into.
async fn run_gateway(rs: Arc<dyn RelationalStore>, jb: Arc<dyn JobBroker>) -> Result<()> {
    let ingestor = GatewayIngestor::new(rs, jb);
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "skipping malformed inbound event");
                continue;
            }
        };
        let event_id = event.event_id().to_string();
        if let Err(e) = ingestor.handle(event).await {
            warn!(event_id, error = %e, "failed to ingest event");
        }
    }

    Ok(())
}
