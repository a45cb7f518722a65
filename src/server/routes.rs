use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{GeneratorError, Result};
use crate::llm::LlmEngine;

use super::handlers;

/// State shared across all routes.  Read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<LlmEngine>,
}

pub fn build(llm: Arc<LlmEngine>, config: &Config) -> Result<Router> {
    let state = AppState { llm };

    let mut router = Router::new()
        .route("/", get(handlers::root))
        .route("/generate", post(handlers::generate))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&config.server.cors_origins)? {
        tracing::info!(origins = ?config.server.cors_origins, "CORS enabled");
        router = router.layer(cors);
    }

    Ok(router.with_state(state))
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>> {
    if origins.is_empty() {
        return Ok(None);
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| GeneratorError::Config(format!("invalid CORS origin: {o:?}")))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]),
    ))
}
