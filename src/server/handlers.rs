use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use super::routes::AppState;
use crate::descriptor::{DeploymentDescriptor, ValidationError};
use crate::error::GeneratorError;
use crate::llm::prompts;

#[derive(Serialize)]
pub struct GenerateResponse {
    pub dockerfile: String,
}

/// Failures surfaced to API callers.  Provider details are logged by the
/// handler and never serialized.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    Generation,
    Timeout,
}

impl From<GeneratorError> for ApiError {
    fn from(err: GeneratorError) -> Self {
        match err {
            GeneratorError::Validation(v) => ApiError::Validation(v),
            GeneratorError::Timeout(_) => ApiError::Timeout,
            _ => ApiError::Generation,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(v) => (StatusCode::UNPROCESSABLE_ENTITY, Json(v)).into_response(),
            ApiError::Generation => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": "Failed to generate Dockerfile" })),
            )
                .into_response(),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "detail": "Dockerfile generation timed out" })),
            )
                .into_response(),
        }
    }
}

// -- Health ------------------------------------------------------------------

pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Dockerfile Generator API is running!" }))
}

// -- Generation --------------------------------------------------------------

pub async fn generate(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let descriptor = DeploymentDescriptor::from_json(&body).map_err(|e| {
        info!(fields = ?e.fields(), "rejected generate request");
        ApiError::Validation(e)
    })?;

    debug!(?descriptor, "generate request");

    let prompt = prompts::build_prompt(&descriptor);
    debug!(%prompt, "prompt built");

    let dockerfile = state.llm.generate(&prompt).await.map_err(|e| {
        if e.is_generation_failure() {
            warn!(backend = state.llm.active_backend(), "generation failed: {e}");
        } else {
            error!(backend = state.llm.active_backend(), "generate: {e}");
        }
        ApiError::from(e)
    })?;

    info!(
        backend = state.llm.active_backend(),
        language = descriptor.language(),
        dockerfile_len = dockerfile.len(),
        "Dockerfile generated"
    );

    Ok(Json(GenerateResponse { dockerfile }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::error::Result;
    use crate::llm::{LlmBackend, LlmEngine, MockEngine};
    use crate::server::routes;

    use super::*;

    const PROVIDER_SECRET: &str = "AccessDeniedException: account 123456789012 not authorized";

    /// Counts calls and returns either the canned mock output or a provider
    /// failure.
    struct Recording {
        calls: AtomicUsize,
        fail: Option<fn() -> GeneratorError>,
    }

    #[async_trait::async_trait]
    impl LlmBackend for Recording {
        fn name(&self) -> &str { "recording" }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail {
                Some(f) => Err(f()),
                None => MockEngine::new().generate(prompt).await,
            }
        }
    }

    struct Hang;

    #[async_trait::async_trait]
    impl LlmBackend for Hang {
        fn name(&self) -> &str { "hang" }
        async fn generate(&self, _prompt: &str) -> Result<String> {
            std::future::pending().await
        }
    }

    fn app_with(backend: Arc<dyn LlmBackend>, timeout: Duration) -> axum::Router {
        let llm = Arc::new(LlmEngine::with_backend("test", backend, timeout));
        routes::build(llm, &Config::default()).unwrap()
    }

    fn recording(fail: Option<fn() -> GeneratorError>) -> Arc<Recording> {
        Arc::new(Recording {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn post_generate(body: serde_json::Value) -> Request<Body> {
        Request::post("/generate")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn python_app() -> serde_json::Value {
        json!({
            "language": "Python",
            "package_manager": "pip",
            "dependency_file": "requirements.txt",
            "port": 8000,
            "start_command": "python app.py"
        })
    }

    async fn read_json(resp: Response) -> serde_json::Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn root_reports_running() {
        let app = app_with(recording(None), Duration::from_secs(5));
        let resp = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            read_json(resp).await,
            json!({ "message": "Dockerfile Generator API is running!" })
        );
    }

    #[tokio::test]
    async fn generate_with_mock_backend() {
        let app = app_with(Arc::new(MockEngine::new()), Duration::from_secs(5));
        let resp = app.oneshot(post_generate(python_app())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = read_json(resp).await;
        let dockerfile = body["dockerfile"].as_str().unwrap();
        assert!(dockerfile.contains("EXPOSE 8000"));
        assert!(dockerfile.lines().any(|l| l.starts_with("CMD") && l.contains("app.py")));
    }

    #[tokio::test]
    async fn missing_field_is_422_without_backend_call() {
        let backend = recording(None);
        let app = app_with(backend.clone(), Duration::from_secs(5));

        let mut req = python_app();
        req.as_object_mut().unwrap().remove("start_command");
        let resp = app.oneshot(post_generate(req)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(resp).await;
        assert_eq!(body["detail"][0]["loc"], json!(["body", "start_command"]));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_integer_port_is_422() {
        let backend = recording(None);
        let app = app_with(backend.clone(), Duration::from_secs(5));

        let mut req = python_app();
        req["port"] = json!("abc");
        let resp = app.oneshot(post_generate(req)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(resp).await;
        assert_eq!(body["detail"][0]["loc"], json!(["body", "port"]));
        assert_eq!(body["detail"][0]["type"], "int_type");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn numeric_string_port_is_accepted() {
        let backend = recording(None);
        let app = app_with(backend.clone(), Duration::from_secs(5));

        let mut req = python_app();
        req["port"] = json!("8000");
        let resp = app.oneshot(post_generate(req)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_json_is_422() {
        let app = app_with(recording(None), Duration::from_secs(5));
        let req = Request::post("/generate")
            .header("content-type", "application/json")
            .body(Body::from("{\"language\": "))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(read_json(resp).await["detail"][0]["type"], "json_invalid");
    }

    #[tokio::test]
    async fn provider_failure_is_generic_500() {
        let backend = recording(Some(|| GeneratorError::Llm(PROVIDER_SECRET.into())));
        let app = app_with(backend.clone(), Duration::from_secs(5));

        let resp = app.oneshot(post_generate(python_app())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("AccessDenied"));
        assert!(!text.contains("123456789012"));
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({ "detail": "Failed to generate Dockerfile" })
        );
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_provider_text_is_500() {
        let backend = recording(Some(|| GeneratorError::Llm("Bedrock returned empty response".into())));
        let app = app_with(backend, Duration::from_secs(5));
        let resp = app.oneshot(post_generate(python_app())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_504() {
        let app = app_with(Arc::new(Hang), Duration::from_secs(1));
        let resp = app.oneshot(post_generate(python_app())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            read_json(resp).await,
            json!({ "detail": "Dockerfile generation timed out" })
        );
    }

    #[test]
    fn error_mapping() {
        assert!(matches!(
            ApiError::from(GeneratorError::Timeout(3)),
            ApiError::Timeout
        ));
        assert!(matches!(
            ApiError::from(GeneratorError::Llm("boom".into())),
            ApiError::Generation
        ));
    }
}
