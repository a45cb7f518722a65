use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::error::{GeneratorError, Result};

/// LLM engine backed by the Amazon Bedrock runtime `InvokeModel` API.
///
/// Sends an Anthropic messages envelope to
/// `{endpoint}/model/{model_id}/invoke` and authenticates with a Bedrock API
/// key as a bearer token.  The first text block of the reply is returned.
pub struct BedrockEngine {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
    anthropic_version: String,
    max_tokens: u32,
    temperature: f32,
}

// -- Anthropic-on-Bedrock request/response types ---

#[derive(Serialize)]
struct InvokeRequest<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<RequestBlock<'a>>,
}

#[derive(Serialize)]
struct RequestBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(alias = "Message")]
    message: Option<String>,
}

impl BedrockEngine {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let bedrock = &config.bedrock;

        if bedrock.api_key.is_empty() {
            return Err(GeneratorError::Config(
                "Bedrock API key required: set AWS_BEARER_TOKEN_BEDROCK env var \
                 or llm.bedrock.api_key in config"
                    .into(),
            ));
        }

        let endpoint = if bedrock.endpoint.is_empty() {
            format!("https://bedrock-runtime.{}.amazonaws.com", bedrock.region)
        } else {
            bedrock.endpoint.trim_end_matches('/').to_string()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| GeneratorError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model_id = %bedrock.model_id,
            endpoint = %endpoint,
            max_tokens = config.max_tokens,
            temperature = config.temperature,
            "Bedrock engine initialized"
        );

        Ok(Self {
            client,
            api_key: bedrock.api_key.clone(),
            endpoint,
            model_id: bedrock.model_id.clone(),
            anthropic_version: bedrock.anthropic_version.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.endpoint, encode_model_id(&self.model_id))
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> InvokeRequest<'a> {
        InvokeRequest {
            anthropic_version: &self.anthropic_version,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: vec![RequestBlock { kind: "text", text: prompt }],
            }],
        }
    }

    /// Send the prompt to Bedrock and return the generated text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(
            model_id = %self.model_id,
            prompt_len = prompt.len(),
            max_tokens = self.max_tokens,
            "invoking Bedrock model"
        );

        let resp = self
            .client
            .post(self.invoke_url())
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GeneratorError::Llm(format!("Bedrock request failed: {e}")))?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let error_msg = serde_json::from_str::<ErrorResponse>(&error_text)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(error_text);

            warn!(
                status = %status,
                model_id = %self.model_id,
                error = %error_msg,
                "Bedrock API error"
            );

            return Err(GeneratorError::Llm(format!(
                "Bedrock returned {status}: {error_msg}"
            )));
        }

        let body: InvokeResponse = resp.json().await.map_err(|e| {
            GeneratorError::Llm(format!("failed to parse Bedrock response: {e}"))
        })?;

        if let Some(ref usage) = body.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = ?body.stop_reason,
                "Bedrock usage"
            );
        }

        let response = first_text(body)?;

        info!(
            response_len = response.len(),
            model_id = %self.model_id,
            "Bedrock response received"
        );

        Ok(response)
    }
}

fn first_text(body: InvokeResponse) -> Result<String> {
    let text = body
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .unwrap_or_default()
        .trim()
        .to_string();

    if text.is_empty() {
        return Err(GeneratorError::Llm("Bedrock returned empty response".into()));
    }
    Ok(text)
}

/// Percent-encode a model id or ARN for use as one URL path segment.
fn encode_model_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
