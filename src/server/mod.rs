//! HTTP surface
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /repo/<spec>/<path>` | resolve, build if needed, serve `<path>` |
//! | `GET /api/v1/resolve?q=<spec>` | answer document as JSON |
//! | anything else | `server.static_dir`, if configured |

pub mod files;
mod handlers;

pub use handlers::{AppState, SharedState};

use crate::config::{Config, ConfigManager};
use crate::error::{BookpubError, BookpubResult};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::{info, warn};

/// Build the application router
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/repo/{*rest}", get(handlers::repo))
        .route("/api/v1/resolve", get(handlers::resolve))
        .fallback(handlers::static_files)
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(config: Config) -> BookpubResult<()> {
    ConfigManager::ensure_storage_dirs(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new(AppState::from_config(config)?);
    info!(
        "{} checkouts and {} built sites on disk",
        state.orchestrator.checkouts().keys().await?.len(),
        state.orchestrator.artifacts().keys().await?.len()
    );

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BookpubError::io(format!("binding {}", addr), e))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| BookpubError::io("serving HTTP", e))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
