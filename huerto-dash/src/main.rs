//! huerto-dash - soil telemetry dashboard service
//!
//! Pulls soil readings from the SenseCAP API, builds the hourly day/night
//! labeled dataset, caches it in SQLite and serves it as JSON.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use huerto_common::config::{
    resolve_credentials, CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use huerto_dash::models::Snapshot;
use huerto_dash::services::{ModelArtifact, Pipeline, TelemetryClient};
use huerto_dash::solar::SolarCalendar;
use huerto_dash::AppState;

/// Command-line arguments for huerto-dash
#[derive(Parser, Debug)]
#[command(name = "huerto-dash")]
#[command(about = "Soil telemetry day/night dashboard service")]
#[command(version)]
struct Args {
    /// Root folder holding the dataset cache and model artifact
    #[arg(short, long, env = "HUERTO_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "HUERTO_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "HUERTO_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "HUERTO_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config warnings are emitted before the level it configures is known
    let config = tracing::subscriber::with_default(
        tracing_subscriber::fmt().with_env_filter(EnvFilter::new("info")).finish(),
        || TomlConfig::load_or_default(args.config.as_deref()),
    );

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=debug", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting huerto-dash v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    // Root folder: CLI/ENV (clap) -> TOML -> default
    let root_folder = RootFolderResolver::new(args.root_folder.clone(), config.root_folder.clone()).resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let calendar = Arc::new(match &config.solar.calendar_path {
        Some(path) => SolarCalendar::load_file(path)
            .with_context(|| format!("Failed to load solar calendar {}", path.display()))?,
        None => SolarCalendar::embedded().context("Embedded solar calendar is invalid")?,
    });
    info!(warnings = calendar.warnings().len(), "Solar calendar loaded");

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = huerto_dash::db::init_database_pool(&db_path)
        .await
        .context("Failed to open database")?;

    let snapshot = match huerto_dash::db::load_snapshot(&db_pool).await {
        Ok(Some(snapshot)) => {
            info!(records = snapshot.dataset.len(), "Loaded cached dataset");
            snapshot
        }
        Ok(None) => {
            info!("No cached dataset yet; POST /api/refresh to build one");
            Snapshot::default()
        }
        Err(e) => {
            warn!("Ignoring unreadable dataset cache: {}", e);
            Snapshot::default()
        }
    };

    let mut state = AppState::new(db_pool, Arc::clone(&calendar)).with_snapshot(snapshot);

    let model_path = config
        .model
        .artifact_path
        .clone()
        .unwrap_or_else(|| initializer.model_path());
    match ModelArtifact::load_optional(&model_path) {
        Ok(Some(model)) => state = state.with_classifier(Arc::new(model)),
        Ok(None) => info!("No classifier artifact at {}; predictions disabled", model_path.display()),
        Err(e) => warn!("Classifier disabled: {}", e),
    }

    match resolve_credentials(&config.telemetry) {
        Some(credentials) => {
            let client = TelemetryClient::new(
                config.telemetry.base_url.clone(),
                credentials,
                config.telemetry.channel_index,
                Duration::from_secs(config.telemetry.timeout_secs),
            )
            .context("Failed to build telemetry client")?;
            let pipeline = Pipeline::new(
                client,
                Arc::clone(&calendar),
                config.telemetry.devices.clone(),
                config.telemetry.epoch_start,
            );
            state = state.with_pipeline(Arc::new(pipeline));
        }
        None => warn!("Telemetry credentials not configured; serving cached data only"),
    }

    let app = huerto_dash::build_router(state);

    let defaults = CompiledDefaults::for_current_platform();
    let host = args
        .host
        .or(config.server.host.clone())
        .unwrap_or(defaults.host);
    let port = args.port.or(config.server.port).unwrap_or(defaults.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
