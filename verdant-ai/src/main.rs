//! verdant-ai - Plant Image Analysis microservice
//!
//! Accepts uploaded plant images, asks Gemini to identify the plant and
//! assess its health, and stores the result with catalog product
//! suggestions. Failed analyses delete the upload again.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use verdant_ai::db::{SqliteAnalysisStore, SqliteCatalog};
use verdant_ai::services::{
    AnalysisPipeline, GeminiClient, HttpImageFetcher, ProductMatcher, UploadThingClient,
};
use verdant_ai::{config, AppState};
use verdant_common::config::{default_config_path, load_toml_config, resolve_root_folder};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "verdant-ai")]
#[command(about = "Plant image analysis service", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "VERDANT_AI_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "VERDANT_AI_PORT")]
    port: Option<u16>,

    /// SQLite database file
    #[arg(short, long, env = "VERDANT_DATABASE")]
    database: Option<PathBuf>,

    /// Data root folder
    #[arg(short, long)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .or_else(|| default_config_path("verdant-ai"))
        .context("Unable to determine config file location")?;
    let toml_config = load_toml_config(&config_path)?;

    init_tracing(&toml_config.logging.level);

    info!("Starting verdant-ai (Plant Analysis) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if !config_path.exists() {
        warn!(
            "Config file not found at {}, using built-in defaults",
            config_path.display()
        );
    }

    // Credentials first: a misconfigured service must not start
    let gemini_config = config::resolve_gemini_config(&toml_config)?;
    let storage_settings = config::resolve_storage_settings(&toml_config)?;

    let inference = GeminiClient::new(gemini_config).context("Gemini client setup failed")?;
    info!("Inference model: {}", inference.model());
    let assets = UploadThingClient::new(
        storage_settings.api_key,
        storage_settings.api_base.as_deref(),
    )
    .context("Storage client setup failed")?;
    let fetcher = HttpImageFetcher::new(config::fetch_timeout(&toml_config))
        .context("Image fetcher setup failed")?;

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = config::resolve_database_path(args.database.as_deref(), &root_folder, &toml_config);
    info!("Database: {}", db_path.display());

    let db_pool = verdant_ai::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let catalog = Arc::new(SqliteCatalog::new(db_pool.clone()));
    let store = Arc::new(SqliteAnalysisStore::new(db_pool.clone()));

    let pipeline = AnalysisPipeline::new(
        Arc::new(fetcher),
        Arc::new(inference),
        catalog.clone(),
        store.clone(),
        Arc::new(assets),
        config::pipeline_settings(&toml_config),
    );
    let matcher = ProductMatcher::new(catalog, store.clone());

    let state = AppState::new(db_pool, pipeline, matcher, store);
    let app = verdant_ai::build_router(state);

    let port = config::resolve_port(args.port, &toml_config);
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// RUST_LOG wins; otherwise the TOML level applies to this service's crates
fn init_tracing(level: &str) {
    let default_directives = if level.contains('=') {
        level.to_string()
    } else {
        format!(
            "verdant_ai={0},verdant_common={0},tower_http={0}",
            level.trim()
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directives.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
