pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::error::{GeneratorError, Result};
use crate::llm::LlmEngine;

/// Bind `config.bind` and serve the API until `shutdown` fires.
pub async fn serve(
    config: Config,
    llm: Arc<LlmEngine>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = routes::build(llm, &config)?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .map_err(|e| GeneratorError::Config(format!("failed to bind {}: {e}", config.bind)))?;

    info!(bind = %config.bind, "API listening (HTTP)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| GeneratorError::Config(format!("server error: {e}")))?;

    Ok(())
}
