//! ordr-rv - Order Reconciliation Validator
//!
//! Validates uploaded order documents against the network's order records.
//! Documents are read from a directory of JSON grids; reports are kept in
//! SQLite behind an in-memory cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ordr_common::config::{load_toml_config, resolve_config_path, resolve_network_api_url, TomlConfig};
use ordr_common::events::EventBus;
use ordr_rv::db::SqliteReportStore;
use ordr_rv::services::{
    DirectoryFileProvider, EngineConfig, LayeredReportStore, MemoryReportStore, NetworkOrderClient,
    ValidationService,
};
use ordr_rv::AppState;

const SERVICE_NAME: &str = "ordr-rv";
const EVENT_BUS_CAPACITY: usize = 100;

/// Command-line arguments for ordr-rv
#[derive(Parser, Debug)]
#[command(name = "ordr-rv")]
#[command(about = "Order reconciliation validator")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "ORDR_RV_LISTEN")]
    listen: Option<String>,

    /// Directory of uploaded documents, overrides the config file
    #[arg(long, env = "ORDR_RV_DOCUMENTS_DIR")]
    documents_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), SERVICE_NAME);
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&config)?;

    info!("Starting ordr-rv (Order Reconciliation Validator)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    let api_url = resolve_network_api_url(&config)?;
    let engine_config = EngineConfig::from_toml(&config);
    let orders = NetworkOrderClient::new(api_url, engine_config.fetch_timeout)
        .context("Failed to create network client")?;

    let documents_dir = args
        .documents_dir
        .clone()
        .unwrap_or_else(|| config.documents_dir_or_default(SERVICE_NAME));
    info!("Documents: {}", documents_dir.display());

    let db_path = config.database_path_or_default(SERVICE_NAME);
    info!("Database: {}", db_path.display());
    let pool = ordr_rv::db::init_database_pool(&db_path).await?;

    let store = LayeredReportStore::new(
        MemoryReportStore::new(config.report_cache_capacity),
        Arc::new(SqliteReportStore::new(pool)),
    );

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let service = ValidationService::new(
        Arc::new(DirectoryFileProvider::new(documents_dir)),
        Arc::new(orders),
        Arc::new(store),
        event_bus,
        engine_config,
    );

    let state = AppState::new(service);
    let _failure_tracker = state.track_failures();
    let app = ordr_rv::build_router(state);

    let listen = args.listen.unwrap_or_else(|| config.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;
    info!("Listening on http://{}", listen);
    info!("Health check: http://{}/health", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the `[logging]` level; a log file replaces stdout
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},tower_http=info", config.logging.level).into());

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
