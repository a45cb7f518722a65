use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{GeneratorError, Result};

/// LLM engine backed by the Google Gemini `generateContent` API.
///
/// Authentication uses a Google AI Studio key (`GEMINI_API_KEY` or
/// `GOOGLE_API_KEY`), sent in the `x-goog-api-key` header.
pub struct GeminiEngine {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiEngine {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let gemini = &config.gemini;

        if gemini.api_key.is_empty() {
            return Err(GeneratorError::Config(
                "Gemini API key required: set GEMINI_API_KEY (or GOOGLE_API_KEY) env var \
                 or llm.gemini.api_key in config"
                    .into(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GeneratorError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model = %gemini.model,
            base_url = %gemini.base_url,
            max_tokens = config.max_tokens,
            temperature = config.temperature,
            "Gemini engine initialized"
        );

        Ok(Self {
            client,
            api_key: gemini.api_key.clone(),
            base_url: gemini.base_url.trim_end_matches('/').to_string(),
            model: gemini.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body<'a>(&self, prompt: &'a str) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.max_tokens,
                temperature: self.temperature,
            },
        }
    }

    /// Send the prompt to Gemini and return the generated text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            "invoking Gemini API"
        );

        let resp = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GeneratorError::Llm(format!("Gemini request failed: {e}")))?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = serde_json::from_str::<ErrorResponse>(&error_text)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_text);

            warn!(status = %status, error = %error_msg, "Gemini API error");

            return Err(GeneratorError::Llm(format!(
                "Gemini returned {status}: {error_msg}"
            )));
        }

        let body: GenerateContentResponse = resp.json().await.map_err(|e| {
            GeneratorError::Llm(format!("failed to parse Gemini response: {e}"))
        })?;

        let response = response_text(body)?;

        info!(response_len = response.len(), model = %self.model, "Gemini response received");

        Ok(response)
    }
}

fn response_text(body: GenerateContentResponse) -> Result<String> {
    if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GeneratorError::Llm(format!("Gemini blocked the prompt: {reason}")));
    }

    let Some(candidate) = body.candidates.into_iter().next() else {
        return Err(GeneratorError::Llm("Gemini returned no candidates".into()));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    let text = text.trim().to_string();

    if text.is_empty() {
        return Err(GeneratorError::Llm(format!(
            "Gemini returned empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}
