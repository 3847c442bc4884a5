//! blober server binary.

use anyhow::{Context, Result};
use blober_core::config::AppConfig;
use blober_server::{AppState, create_router};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// blober - multi-tenant blob hosting
#[derive(Parser, Debug)]
#[command(name = "bloberd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BLOBER_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration from an optional TOML file and `BLOBER_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let mut figment = Figment::new();

    if std::path::Path::new(path).exists() {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::info!(
            config_path = %path,
            "No config file found, using defaults and environment variables"
        );
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("BLOBER_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    Ok(config)
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("blober v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;

    // Initialize storage backend
    let storage = blober_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend ready");

    // Initialize relational store
    let metadata = blober_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata health check failed")?;
    tracing::info!("Metadata store ready");

    // Open both caches
    let caches = blober_cache::from_config(&config.cache).context("failed to open caches")?;
    tracing::info!(
        session_path = %config.cache.session_path.display(),
        blob_path = %config.cache.blob_path.display(),
        "Caches opened"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = blober_cache::spawn_sweeper(
        caches.sessions.clone(),
        config.cache.sweep_interval(),
        shutdown_rx,
    );
    tracing::info!(
        interval_secs = config.cache.sweep_interval_secs,
        "Session sweeper spawned"
    );

    let sessions = caches.sessions.clone();
    let blobs = caches.blobs.clone();
    let state = AppState::new(
        config.clone(),
        storage,
        metadata,
        caches.sessions,
        caches.blobs,
    );
    let app = create_router(state);

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // Stop the sweeper before flushing so no sweep races the final flush.
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Session sweeper task ended abnormally");
    }

    if let Err(e) = sessions.flush().await {
        tracing::error!(error = %e, "Failed to flush session cache");
    }
    if let Err(e) = blobs.flush().await {
        tracing::error!(error = %e, "Failed to flush blob cache");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
