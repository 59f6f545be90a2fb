use crate::domain::contract::FieldViolation;
use crate::llm::Provider;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PredictionError {
    #[error("{provider} backend unavailable (stage={stage}): {detail}")]
    BackendUnavailable {
        provider: Provider,
        stage: &'static str,
        detail: String,
    },

    #[error("{provider} backend did not respond within {after:?}")]
    BackendTimeout { provider: Provider, after: Duration },

    #[error("malformed model response: {detail}")]
    MalformedResponse { detail: String, raw_output: String },

    #[error("model response violates prediction schema: {violation}")]
    SchemaViolation {
        violation: FieldViolation,
        raw_output: String,
    },
}

impl PredictionError {
    /// Backend text kept for diagnostics; never sent to callers.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            PredictionError::MalformedResponse { raw_output, .. }
            | PredictionError::SchemaViolation { raw_output, .. } => Some(raw_output),
            PredictionError::BackendUnavailable { .. } | PredictionError::BackendTimeout { .. } => {
                None
            }
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            PredictionError::BackendUnavailable { stage, .. } => stage,
            PredictionError::BackendTimeout { .. } => "timeout",
            PredictionError::MalformedResponse { .. } => "parse",
            PredictionError::SchemaViolation { .. } => "validate",
        }
    }
}
