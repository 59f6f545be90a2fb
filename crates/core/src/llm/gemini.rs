use crate::config::Settings;
use crate::llm::error::PredictionError;
use crate::llm::prompt::SYSTEM_PROMPT;
use crate::llm::{http_client, transport_error, PredictionBackend, Provider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Hosted Gemini `generateContent` with `responseSchema` structured output.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        Self::new(api_key, base_url, model, settings.prediction_timeout)
    }

    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            api_key,
            base_url,
            model,
            timeout,
        })
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> Result<(String, GenerateContentResponse), PredictionError> {
        let res = self
            .http
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(req)
            .send()
            .await
            .map_err(|e| transport_error(Provider::Gemini, "send", self.timeout, e))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| transport_error(Provider::Gemini, "read_body", self.timeout, e))?;
        if !status.is_success() {
            // Upstream error bodies stay in the logs.
            tracing::warn!(
                provider = %Provider::Gemini,
                %status,
                body = %text,
                "backend returned non-success status"
            );
            return Err(PredictionError::BackendUnavailable {
                provider: Provider::Gemini,
                stage: "http",
                detail: format!("status={status}"),
            });
        }

        let parsed = serde_json::from_str::<GenerateContentResponse>(&text).map_err(|e| {
            PredictionError::MalformedResponse {
                detail: format!("unexpected Gemini response envelope: {e}"),
                raw_output: text.clone(),
            }
        })?;
        Ok((text, parsed))
    }

    /// Gemini's OpenAPI-style schema spells types in upper case.
    fn response_schema(schema: &Value) -> Value {
        match schema {
            Value::Object(obj) => Value::Object(
                obj.iter()
                    .map(|(k, v)| {
                        let v = match (k.as_str(), v) {
                            ("type", Value::String(t)) => Value::String(t.to_ascii_uppercase()),
                            _ => Self::response_schema(v),
                        };
                        (k.clone(), v)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(Self::response_schema).collect()),
            other => other.clone(),
        }
    }

    fn response_text(res: &GenerateContentResponse) -> Option<String> {
        let candidate = res.candidates.first()?;
        let content = candidate.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait::async_trait]
impl PredictionBackend for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn invoke(&self, prompt: &str, schema: &Value) -> Result<String, PredictionError> {
        let req = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_PROMPT.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: Self::response_schema(schema),
            },
        };

        let (raw_body, res) = self.generate_content(&req).await?;
        match Self::response_text(&res) {
            Some(text) => Ok(text),
            None => {
                let finish_reason = res
                    .candidates
                    .first()
                    .and_then(|c| c.finish_reason.as_deref())
                    .unwrap_or("none");
                Err(PredictionError::MalformedResponse {
                    detail: format!("Gemini returned no candidate text (finish_reason={finish_reason})"),
                    raw_output: raw_body,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}
