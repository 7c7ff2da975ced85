//! # Shopkeep API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tracing (RUST_LOG, default info,shopkeep=debug,sqlx=warn)          │
//! │  2. AppConfig::load (shopkeep.toml + SHOPKEEP__* env)                  │
//! │  3. Database::new (pool + migrations)                                  │
//! │  4. axum::serve until Ctrl+C / SIGTERM                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An explicit config file can be passed as the first argument.

use anyhow::Context;
use shopkeep_api::{app, AppConfig, AppState};
use shopkeep_db::{Database, DbConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopkeep=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Shopkeep API server...");

    let config_file = std::env::args().nth(1);
    let config = AppConfig::load(config_file.as_deref()).context("loading configuration")?;
    let addr = config.bind_addr()?;
    info!(
        %addr,
        db = %config.database.path,
        store = %config.store.name,
        "Configuration loaded"
    );

    let db_config = if config.database.path == ":memory:" {
        warn!("Using an in-memory database; data is lost on exit");
        DbConfig::in_memory()
    } else {
        DbConfig::new(&config.database.path).max_connections(config.database.max_connections)
    };
    let db = Database::new(db_config)
        .await
        .context("opening database")?;

    let state = AppState::new(db.clone(), config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(%addr, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(?e, "Failed to install SIGTERM handler");
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
