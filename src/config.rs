use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{GeneratorError, Result};

/// Backend keys accepted by `llm.backend`.
pub const BACKENDS: &[&str] = &["bedrock", "gemini", "mock"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server listens on.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,
}

// -- Server ------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Origins allowed to call the API from a browser.  Empty disables CORS.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// Backend to use: "bedrock" (default), "gemini", or "mock".
    /// Can be overridden with the `LLM_BACKEND` env var.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Upper bound on a single generation call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub bedrock: BedrockConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BedrockConfig {
    /// AWS region hosting the model (`AWS_REGION`).
    #[serde(default = "default_region")]
    pub region: String,

    /// Bedrock model identifier (`BEDROCK_MODEL_ID`).
    #[serde(default = "default_bedrock_model")]
    pub model_id: String,

    #[serde(default = "default_anthropic_version")]
    pub anthropic_version: String,

    /// Runtime endpoint override, e.g. a VPC endpoint (`BEDROCK_ENDPOINT`).
    /// Empty derives the public endpoint from `region`.
    #[serde(default)]
    pub endpoint: String,

    /// Bedrock API key (`AWS_BEARER_TOKEN_BEDROCK`).
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// Model name (`GEMINI_MODEL`).
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// API root (`GEMINI_BASE_URL`).
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// API key (`GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`).
    #[serde(default)]
    pub api_key: String,
}

// -- Defaults ----------------------------------------------------------------

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}
fn default_backend() -> String {
    "bedrock".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.5
}
fn default_region() -> String {
    "us-west-2".into()
}
fn default_bedrock_model() -> String {
    "anthropic.claude-v2:1".into()
}
fn default_anthropic_version() -> String {
    "bedrock-2023-05-31".into()
}
fn default_gemini_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            bedrock: BedrockConfig::default(),
            gemini: GeminiConfig::default(),
        }
    }
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            model_id: default_bedrock_model(),
            anthropic_version: default_anthropic_version(),
            endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            base_url: default_gemini_base_url(),
            api_key: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)
                .map_err(|e| GeneratorError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/dockerfile-generator/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("dockerfile-generator")
            .join("config.toml")
    }

    /// Layer environment variables over file values.  `lookup` is
    /// `std::env::var` in production; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            self.bind = v;
        }
        if let Some(v) = get("LLM_BACKEND") {
            self.llm.backend = v;
        }
        if let Some(v) = get("LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = v.trim().parse().map_err(|_| {
                GeneratorError::Config(format!("LLM_TIMEOUT_SECS must be an integer, got {v:?}"))
            })?;
        }

        if let Some(v) = get("AWS_REGION") {
            self.llm.bedrock.region = v;
        }
        if let Some(v) = get("BEDROCK_MODEL_ID") {
            self.llm.bedrock.model_id = v;
        }
        if let Some(v) = get("BEDROCK_ENDPOINT") {
            self.llm.bedrock.endpoint = v;
        }
        if let Some(v) = get("AWS_BEARER_TOKEN_BEDROCK") {
            self.llm.bedrock.api_key = v;
        }

        if let Some(v) = get("GEMINI_MODEL") {
            self.llm.gemini.model = v;
        }
        if let Some(v) = get("GEMINI_BASE_URL") {
            self.llm.gemini.base_url = v;
        }
        if let Some(v) = get("GEMINI_API_KEY").or_else(|| get("GOOGLE_API_KEY")) {
            self.llm.gemini.api_key = v;
        }

        Ok(())
    }

    /// Reject settings that can never serve a request.  Backend credentials
    /// are checked when the backend itself is constructed.
    pub fn validate(&self) -> Result<()> {
        if !BACKENDS.contains(&self.llm.backend.as_str()) {
            return Err(GeneratorError::Config(format!(
                "unknown LLM backend \"{}\" (available: [{}])",
                self.llm.backend,
                BACKENDS.join(", ")
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(GeneratorError::Config(
                "llm.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.bind.trim().is_empty() {
            return Err(GeneratorError::Config("bind address is empty".into()));
        }
        Ok(())
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let c = Config::default();
        assert_eq!(c.bind, "127.0.0.1:8000");
        assert!(c.server.cors_origins.is_empty());
        assert!(c.validate().is_ok());
    }

    #[test]
    fn default_llm_config() {
        let llm = LlmConfig::default();
        assert_eq!(llm.backend, "bedrock");
        assert_eq!(llm.timeout_secs, 60);
        assert_eq!(llm.max_tokens, 512);
        assert!((llm.temperature - 0.5).abs() < 0.001);
        assert_eq!(llm.bedrock.region, "us-west-2");
        assert_eq!(llm.bedrock.model_id, "anthropic.claude-v2:1");
        assert_eq!(llm.bedrock.anthropic_version, "bedrock-2023-05-31");
        assert!(llm.bedrock.endpoint.is_empty());
        assert_eq!(llm.gemini.model, "gemini-1.5-flash");
    }

    #[test]
    fn parse_minimal_toml() {
        let c: Config = toml::from_str(r#"bind = "0.0.0.0:9000""#).unwrap();
        assert_eq!(c.bind, "0.0.0.0:9000");
        assert_eq!(c.llm.backend, "bedrock");
    }

    #[test]
    fn parse_llm_section() {
        let toml_str = r#"
        [llm]
        backend = "gemini"
        timeout_secs = 15
        temperature = 0.2

        [llm.gemini]
        model = "gemini-2.0-flash"
        "#;
        let c: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(c.llm.backend, "gemini");
        assert_eq!(c.llm.timeout_secs, 15);
        assert!((c.llm.temperature - 0.2).abs() < 0.001);
        assert_eq!(c.llm.gemini.model, "gemini-2.0-flash");
        assert_eq!(c.llm.max_tokens, 512);
    }

    #[test]
    fn example_config_parses() {
        let c: Config = toml::from_str(Config::default_config_contents()).unwrap();
        assert!(c.validate().is_ok());
        assert_eq!(c.llm.bedrock.model_id, "anthropic.claude-v2:1");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut c = Config::default();
        c.apply_env(env(&[
            ("LLM_BACKEND", "gemini"),
            ("LLM_TIMEOUT_SECS", "20"),
            ("AWS_REGION", "eu-central-1"),
            ("AWS_BEARER_TOKEN_BEDROCK", "bedrock-key"),
            ("GOOGLE_API_KEY", "google-key"),
            ("BIND_ADDR", ""),
        ]))
        .unwrap();
        assert_eq!(c.llm.backend, "gemini");
        assert_eq!(c.llm.timeout_secs, 20);
        assert_eq!(c.llm.bedrock.region, "eu-central-1");
        assert_eq!(c.llm.bedrock.api_key, "bedrock-key");
        assert_eq!(c.llm.gemini.api_key, "google-key");
        assert_eq!(c.bind, "127.0.0.1:8000");
    }

    #[test]
    fn gemini_key_prefers_gemini_var() {
        let mut c = Config::default();
        c.apply_env(env(&[("GEMINI_API_KEY", "a"), ("GOOGLE_API_KEY", "b")]))
            .unwrap();
        assert_eq!(c.llm.gemini.api_key, "a");
    }

    #[test]
    fn bad_timeout_env_is_config_error() {
        let mut c = Config::default();
        let err = c.apply_env(env(&[("LLM_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, GeneratorError::Config(_)));
    }

    #[test]
    fn validate_rejects_unknown_backend_and_zero_timeout() {
        let mut c = Config::default();
        c.llm.backend = "openai".into();
        assert!(c.validate().unwrap_err().to_string().contains("unknown LLM backend"));

        let mut c = Config::default();
        c.llm.timeout_secs = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm]\nbackend = \"mock\"\n").unwrap();
        let c = Config::load(Some(&path)).unwrap();
        assert_eq!(c.llm.backend, "mock");
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let c = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(c.bind, "127.0.0.1:8000");
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[llm\nbackend = ").unwrap();
        assert!(matches!(
            Config::load(Some(&path)),
            Err(GeneratorError::Config(_))
        ));
    }
}
