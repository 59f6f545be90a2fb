use crate::domain::contract;
use crate::domain::prediction::PredictionResult;
use crate::llm::error::PredictionError;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some(after_first) = inner.split_once('\n').map(|(_, rest)| rest) {
            inner = after_first;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '{' to last '}'.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

pub fn parse(raw_text: &str) -> Result<PredictionResult, PredictionError> {
    // Well-formed JSON is judged as-is; extraction only rescues wrapped text.
    let value = match serde_json::from_str::<serde_json::Value>(raw_text.trim()) {
        Ok(value) => value,
        Err(direct_err) => extract_json(raw_text)
            .and_then(|inner| serde_json::from_str::<serde_json::Value>(&inner).ok())
            .ok_or_else(|| PredictionError::MalformedResponse {
                detail: format!("output is not valid JSON: {direct_err}"),
                raw_output: raw_text.to_string(),
            })?,
    };

    contract::validate_and_into_result(&value).map_err(|violation| {
        PredictionError::SchemaViolation {
            violation,
            raw_output: raw_text.to_string(),
        }
    })
}
