//! Backend HTTP server
//!
//! An axum router exposing the two API endpoints plus a health check:
//!
//! - `POST /api/compare`: `{deviceOne, deviceTwo}` to a comparison document
//! - `POST /api/chat`: `{history, message, deviceOneName, deviceTwoName}` to
//!   a streamed `text/plain` reply
//! - `GET /healthz`

pub mod handlers;

use crate::config::Config;
use crate::error::{DuelError, Result};
use crate::providers::{create_provider, Provider};

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct ServerState {
    pub provider: Arc<dyn Provider>,
}

/// Build the API router around `provider`
///
/// # Examples
///
/// ```
/// use device_duel::providers::FakeProvider;
/// use device_duel::server::router;
/// use std::sync::Arc;
///
/// let app = router(Arc::new(FakeProvider::new()));
/// ```
pub fn router(provider: Arc<dyn Provider>) -> Router {
    Router::new()
        .route(
            "/api/compare",
            post(handlers::compare).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/chat",
            post(handlers::chat).fallback(handlers::method_not_allowed),
        )
        .route("/healthz", get(handlers::health))
        .with_state(ServerState { provider })
}

/// Run the backend until Ctrl-C
///
/// # Errors
///
/// Returns error if the provider cannot be created or the address cannot
/// be bound.
pub async fn serve(config: &Config) -> Result<()> {
    let provider = create_provider(&config.provider)?;
    let addr: SocketAddr = config.server.bind.parse().map_err(|e| {
        DuelError::Config(format!("invalid server.bind {}: {}", config.server.bind, e))
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "Device Duel backend listening on http://{} (provider: {})",
        listener.local_addr()?,
        provider.name()
    );

    axum::serve(listener, router(provider))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
