use crate::config::Settings;
use crate::llm::error::PredictionError;
use crate::llm::prompt::SYSTEM_PROMPT;
use crate::llm::{http_client, transport_error, PredictionBackend, Provider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "phi4-mini";

/// Locally served model through Ollama's `/api/chat`, constrained with `format`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let base_url =
            std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::new(base_url, model, settings.prediction_timeout)
    }

    pub fn new(base_url: String, model: String, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
            model,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl PredictionBackend for OllamaClient {
    fn provider(&self) -> Provider {
        Provider::Ollama
    }

    async fn invoke(&self, prompt: &str, schema: &Value) -> Result<String, PredictionError> {
        let req = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            format: schema,
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .json(&req)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Ollama, "send", self.timeout, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| transport_error(Provider::Ollama, "read_body", self.timeout, e))?;
        if !status.is_success() {
            // Upstream error bodies stay in the logs.
            tracing::warn!(
                provider = %Provider::Ollama,
                %status,
                body = %text,
                "backend returned non-success status"
            );
            return Err(PredictionError::BackendUnavailable {
                provider: Provider::Ollama,
                stage: "http",
                detail: format!("status={status}"),
            });
        }

        let parsed = serde_json::from_str::<ChatResponse>(&text).map_err(|e| {
            PredictionError::MalformedResponse {
                detail: format!("unexpected Ollama response envelope: {e}"),
                raw_output: text.clone(),
            }
        })?;
        Ok(parsed.message.content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    format: &'a Value,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}
