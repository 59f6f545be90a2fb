pub mod error;
pub mod gemini;
pub mod json;
pub mod ollama;
pub mod prompt;

use crate::config::Settings;
use crate::llm::error::PredictionError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    Ollama,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Ollama => "ollama",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "ollama" => Ok(Provider::Ollama),
            other => anyhow::bail!("unknown prediction backend {other:?} (expected gemini or ollama)"),
        }
    }
}

#[async_trait::async_trait]
pub trait PredictionBackend: Send + Sync {
    fn provider(&self) -> Provider;

    /// One outbound call; returns the model's raw text.
    async fn invoke(&self, prompt: &str, schema: &Value) -> Result<String, PredictionError>;
}

pub fn backend_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn PredictionBackend>> {
    let backend: Arc<dyn PredictionBackend> = match settings.backend {
        Provider::Gemini => Arc::new(gemini::GeminiClient::from_settings(settings)?),
        Provider::Ollama => Arc::new(ollama::OllamaClient::from_settings(settings)?),
    };
    Ok(backend)
}

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    use anyhow::Context;

    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build reqwest client")
}

pub(crate) fn transport_error(
    provider: Provider,
    stage: &'static str,
    timeout: Duration,
    err: reqwest::Error,
) -> PredictionError {
    if err.is_timeout() {
        PredictionError::BackendTimeout {
            provider,
            after: timeout,
        }
    } else {
        PredictionError::BackendUnavailable {
            provider,
            stage,
            detail: err.to_string(),
        }
    }
}
