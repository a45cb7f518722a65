use thiserror::Error;

use crate::descriptor::ValidationError;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeneratorError {
    /// True for per-request failures of the model provider (as opposed to bad
    /// input or startup configuration).
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Self::Llm(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
