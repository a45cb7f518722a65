//! Fixed-output backend for demos and tests.  Makes no network calls.

use tracing::debug;

use crate::error::Result;

const MOCK_DOCKERFILE: &str = r#"# Example .dockerignore:
# __pycache__/
# *.pyc
# .git
# .env
# venv/

# --- Build stage ---
FROM python:3.12-slim AS builder

WORKDIR /app

COPY requirements.txt .
RUN pip install --no-cache-dir --prefix=/install -r requirements.txt

# --- Runtime stage ---
FROM python:3.12-slim

RUN groupadd --system appuser && useradd --system --gid appuser --no-create-home appuser

WORKDIR /app

COPY --from=builder /install /usr/local
COPY --chown=appuser:appuser . .

USER appuser

EXPOSE 8000

CMD ["python", "app.py"]"#;

pub struct MockEngine;

impl MockEngine {
    pub fn new() -> Self {
        Self
    }

    /// Return the canned Dockerfile, whatever the prompt says.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(prompt_len = prompt.len(), "mock backend returning canned Dockerfile");
        Ok(MOCK_DOCKERFILE.to_string())
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}
