//! # Product Service
//!
//! HTTP server for the product catalog.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Product Service                                  │
//! │                                                                         │
//! │  Client ───► HTTP (PORT) ───► CatalogService ───► SQLite | KvTable    │
//! │                 /product-service/*                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use catalog_db::{open_catalog, CatalogService};
use product_service::{build_router, AppState, ServiceConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is normal outside development
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }

    info!("Starting product service...");

    let config = ServiceConfig::from_env().context("invalid configuration")?;
    let backend = config.backend.name();
    info!(port = config.port, backend, "Configuration loaded");

    let repo = open_catalog(config.backend.clone())
        .await
        .context("failed to open catalog storage")?;
    let state = AppState::new(CatalogService::new(repo), backend);

    let app = build_router(state, &config.cors_origins);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
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
