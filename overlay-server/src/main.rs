//! Stream overlay server - main entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use overlay_common::config::resolve_config;
use overlay_common::time::secs_to_duration;
use overlay_server::catalog::Catalog;
use overlay_server::config::Args;
use overlay_server::AppState;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    let config = resolve_config(args.overrides(), args.config.as_deref())
        .context("Failed to resolve configuration")?;

    // Initialize tracing (RUST_LOG wins over the configured level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting stream overlay server on port {}", config.port);
    info!("Web root: {}", config.web_root.display());

    let catalog = Catalog::load(&config.catalog_file);
    let state =
        AppState::new(&config.state_file, catalog).with_history_file(&config.history_file);
    info!("Catalog: {}", state.catalog.path().display());
    info!("State file: {}", state.persistence.path().display());
    info!("Donation ledger: {}", state.history.path().display());

    // A bad snapshot is not fatal
    if let Err(e) = state.persistence.load().await {
        error!("Failed to load saved state, starting empty: {}", e);
    }

    let autosave = if config.autosave_secs > 0 {
        Some(
            Arc::clone(&state.persistence)
                .spawn_autosave(secs_to_duration(config.autosave_secs)),
        )
    } else {
        info!("Autosave disabled");
        None
    };

    let addr: SocketAddr = format!("{}:{}", config.bind_host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_host, config.port))?;

    let persistence = Arc::clone(&state.persistence);
    let served = overlay_server::api::run(state, &config.web_root, addr, shutdown_signal()).await;

    if let Some(task) = autosave {
        task.abort();
    }
    if persistence.save().await.is_err() {
        warn!("Final save failed; changes since the last save are lost");
    }

    served.context("Server error")?;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
