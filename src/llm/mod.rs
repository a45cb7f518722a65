pub mod prompts;

mod bedrock;
mod gemini;
mod mock;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{BACKENDS, LlmConfig};
use crate::error::{GeneratorError, Result};

pub use bedrock::BedrockEngine;
pub use gemini::GeminiEngine;
pub use mock::MockEngine;

// -- Backend trait ----------------------------------------------------------

/// Trait that all LLM backends implement.  A backend turns one prompt into
/// generated text and reports every failure as an error value.
#[async_trait::async_trait]
pub trait LlmBackend: Send + Sync {
    /// Human-readable name of this backend (e.g. "Amazon Bedrock").
    fn name(&self) -> &str;

    /// Generate text for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl LlmBackend for BedrockEngine {
    fn name(&self) -> &str { "Amazon Bedrock" }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

#[async_trait::async_trait]
impl LlmBackend for GeminiEngine {
    fn name(&self) -> &str { "Gemini API" }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

#[async_trait::async_trait]
impl LlmBackend for MockEngine {
    fn name(&self) -> &str { "mock" }
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate(prompt).await
    }
}

// -- LlmEngine --------------------------------------------------------------

/// Dispatches prompts to the configured backend and bounds each call with
/// a timeout.
///
/// Backends:
/// - **bedrock** -- Amazon Bedrock runtime `InvokeModel` (default)
/// - **gemini**  -- Google Gemini `generateContent`
/// - **mock**    -- fixed Dockerfile, no network
pub struct LlmEngine {
    active: Arc<dyn LlmBackend>,
    active_key: String,
    timeout: Duration,
}

impl LlmEngine {
    /// Build the engine for `config.backend`.  Only the selected backend is
    /// constructed, so missing credentials for it fail here, at startup.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let active: Arc<dyn LlmBackend> = match config.backend.as_str() {
            "bedrock" => Arc::new(BedrockEngine::new(config)?),
            "gemini" => Arc::new(GeminiEngine::new(config)?),
            "mock" => Arc::new(MockEngine::new()),
            other => {
                return Err(GeneratorError::Config(format!(
                    "unknown LLM backend \"{other}\" (available: [{}])",
                    BACKENDS.join(", "),
                )));
            }
        };

        info!(backend = %config.backend, name = active.name(), "LLM backend selected");

        Ok(Self {
            active,
            active_key: config.backend.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Wrap an arbitrary backend, for test doubles.
    #[cfg(test)]
    pub fn with_backend(key: &str, backend: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self {
            active: backend,
            active_key: key.to_string(),
            timeout,
        }
    }

    /// Generate text for `prompt`, failing with `Timeout` if the backend does
    /// not answer within the configured bound.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.active.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = %self.active_key,
                    timeout_secs = self.timeout.as_secs(),
                    "LLM call timed out"
                );
                Err(GeneratorError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Return a human-readable description of the active backend.
    pub fn backend_info(&self) -> &str {
        self.active.name()
    }

    /// Return the key of the active backend.
    pub fn active_backend(&self) -> &str {
        &self.active_key
    }
}
