use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tempestas_core::domain::prediction::PredictionResponse;
use tempestas_core::domain::reading::PredictionRequest;
use tempestas_core::forecast;
use tempestas_core::llm::error::PredictionError;
use tempestas_core::llm::{PredictionBackend, Provider};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn PredictionBackend>,
    pub timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/predict", post(predict));

    // Route name the local-model deployment was published under.
    if state.backend.provider() == Provider::Ollama {
        app = app.route("/predict_ollama", post(predict));
    }

    app.with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let Json(request) = payload?;
    let response = forecast::predict(state.backend.as_ref(), &request, state.timeout).await?;
    Ok(Json(response))
}

#[derive(Debug)]
pub enum ApiError {
    /// Request body could not be read as a `PredictionRequest`.
    Validation { status: StatusCode, message: String },
    Prediction(PredictionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { status, .. } => *status,
            ApiError::Prediction(PredictionError::BackendTimeout { .. }) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Prediction(
                PredictionError::BackendUnavailable { .. }
                | PredictionError::MalformedResponse { .. }
                | PredictionError::SchemaViolation { .. },
            ) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PredictionError> for ApiError {
    fn from(err: PredictionError) -> Self {
        ApiError::Prediction(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Validation { message, .. } => {
                tracing::info!(%status, %message, "rejected prediction request");
                message.clone()
            }
            ApiError::Prediction(err) => {
                sentry::capture_error(err);
                err.to_string()
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
