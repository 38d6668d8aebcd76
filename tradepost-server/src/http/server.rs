//! Axum server setup
//!
//! - Localhost-only CORS by default
//! - Tracing middleware
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tradepost_core::{Marketplace, TradeConfig, TradeError};

use super::routes;
use crate::outbox::Outbox;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 127.0.0.1:3030)
    pub bind_addr: SocketAddr,

    /// Allow permissive CORS (default: false = localhost only)
    ///
    /// WARNING: Setting this to true allows any origin.
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
        }
    }
}

/// Shared application state
pub struct AppState {
    pub market: Marketplace,
    pub outbox: Arc<Outbox>,
    /// How long command endpoints wait for their modal
    pub submission_timeout: Duration,
}

impl AppState {
    /// Open the marketplace with the outbox as its platform ports.
    pub async fn open(trade_config: &TradeConfig) -> Result<Self, TradeError> {
        let outbox = Arc::new(Outbox::from_config(trade_config));
        let market = Marketplace::open(trade_config, outbox.clone(), outbox.clone()).await?;
        Ok(Self {
            market,
            outbox,
            submission_timeout: trade_config.submission_timeout(),
        })
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let cors = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        // Localhost only
        CorsLayer::new()
            .allow_origin([
                HeaderValue::from_static("http://localhost:3000"),
                HeaderValue::from_static("http://localhost:3030"),
                HeaderValue::from_static("http://127.0.0.1:3000"),
                HeaderValue::from_static("http://127.0.0.1:3030"),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::listings::router())
        .merge(routes::offers::router())
        .merge(routes::interactions::router())
        .merge(routes::summary::router())
        .merge(routes::outbox::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the HTTP server.
///
/// # Example
///
/// ```ignore
/// let trade_config = TradeConfig::load()?;
/// run_server(ServerConfig::default(), trade_config).await?;
/// ```
pub async fn run_server(config: ServerConfig, trade_config: TradeConfig) -> Result<(), ServerError> {
    let state = AppState::open(&trade_config).await?;
    tracing::info!(
        data_dir = %trade_config.data_dir.display(),
        summary_channel = ?trade_config.summary_channel,
        categories = trade_config.category_channels.len(),
        "marketplace opened"
    );

    // republish so the pinned summary matches storage after a restart
    if let Err(e) = state.market.listings.refresh_summary().await {
        tracing::warn!(error = %e, "initial summary refresh failed");
    }

    let app = build_router(Arc::new(state), &config);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] TradeError),
}


#[cfg(test)]
mod tests {
    use super::testing::{app, send};
    use super::*;
    use axum::http::StatusCode;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3030);
        assert!(!config.cors_permissive);
    }

    #[tokio::test]
    async fn health_endpoint() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, Duration::from_secs(1)).await;

        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let temp = TempDir::new().unwrap();
        let (app, _) = app(&temp, Duration::from_secs(1)).await;

        let (status, _) = send(&app, "GET", "/boards", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
