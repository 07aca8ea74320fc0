//! `duel serve` handler

use crate::config::Config;
use crate::error::Result;
use crate::server;

/// Run the comparison and chat backend until interrupted
///
/// # Errors
///
/// Returns error if the provider cannot be created (for Gemini, a missing
/// API key) or the bind address is unavailable.
pub async fn run_serve(config: Config) -> Result<()> {
    tracing::info!(
        "Starting backend on {} with provider {}",
        config.server.bind,
        config.provider.provider_type
    );
    server::serve(&config).await
}
