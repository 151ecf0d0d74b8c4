//! cratemind-ai - audio analysis service
//!
//! Submits uploads to the external analysis engine, corrects and classifies
//! the results, and serves job status, tracks and the genre taxonomy over HTTP.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cratemind_ai::config::{resolve_catalog_token, ServiceConfig};
use cratemind_ai::correction::CorrectionPipeline;
use cratemind_ai::engine::ProcessEngine;
use cratemind_ai::enrichment::CatalogClient;
use cratemind_ai::jobs::JobRegistry;
use cratemind_ai::store::SqliteTrackStore;
use cratemind_ai::taxonomy::{self, GenreTaxonomy};
use cratemind_ai::{AppState, BatchOrchestrator};
use cratemind_common::config::{default_config_path, RootFolderInitializer, RootFolderResolver};
use cratemind_common::events::EventBus;

const MODULE_NAME: &str = "cratemind-ai";

/// Command-line arguments for cratemind-ai
#[derive(Parser, Debug)]
#[command(name = "cratemind-ai")]
#[command(about = "Audio analysis orchestration service")]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "CRATEMIND_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME));
    let mut config = match config_path {
        Some(ref path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cratemind-ai version {}", env!("CARGO_PKG_VERSION"));
    if let Some(ref path) = config_path {
        info!("Config: {}", path.display());
    }

    config.validate().context("Invalid configuration")?;

    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_toml_value(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let store = SqliteTrackStore::connect(&db_path)
        .await
        .context("Failed to open track store")?;

    let genres = GenreTaxonomy::load(config.taxonomy.seed_path.as_deref())
        .context("Failed to load genre taxonomy")?;
    info!(genres = genres.len(), "Genre taxonomy ready");

    let pins = config.pin_rules().context("Invalid tempo pin")?;
    info!(pins = pins.len(), "Correction pipeline ready");

    let engine = ProcessEngine::from_config(&config.engine);
    info!(
        program = %config.engine.program,
        mode = ?config.engine.mode,
        workers = engine.workers(),
        "Analysis engine configured"
    );

    let jobs = JobRegistry::new(Duration::from_secs(config.jobs.retention_secs));
    let shutdown = CancellationToken::new();
    let sweeper = jobs.spawn_sweeper(
        Duration::from_secs(config.jobs.sweep_interval_secs),
        shutdown.clone(),
    );

    let event_bus = EventBus::new(100);

    let mut orchestrator = BatchOrchestrator::new(
        Arc::new(engine),
        Arc::new(store),
        taxonomy::shared(genres),
        jobs,
        CorrectionPipeline::new(pins),
        event_bus,
    )
    .with_persist_concurrency(config.jobs.persist_concurrency);

    match config.enrichment {
        Some(ref enrichment) => {
            let mut enrichment = enrichment.clone();
            enrichment.api_token = resolve_catalog_token(&enrichment);
            let client = CatalogClient::from_config(&enrichment)
                .context("Failed to build catalog client")?;
            info!(base_url = %enrichment.base_url, "Catalog enrichment enabled");
            orchestrator = orchestrator.with_enrichment(Arc::new(client));
        }
        None => info!("Catalog enrichment disabled"),
    }

    let app = cratemind_ai::build_router(AppState::new(orchestrator));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    if let Err(e) = sweeper.await {
        warn!("Job sweeper did not stop cleanly: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
