use crate::domain::prediction::{PredictionResponse, PredictionResult};
use crate::domain::reading::PredictionRequest;
use crate::llm::error::PredictionError;
use crate::llm::prompt::{build_prompt, iso8601};
use crate::llm::{json, PredictionBackend};
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

/// How far `predicted_for` may drift from the requested target before it is
/// logged. The backend's value is kept either way.
const PREDICTED_FOR_TOLERANCE_SECS: i64 = 5 * 60;

/// Prompt -> backend -> parse -> assemble, with an overall `timeout` on the
/// backend call.
#[tracing::instrument(
    name = "forecast",
    skip_all,
    fields(device_id = %request.device_id, provider = %backend.provider(), records = request.records.len())
)]
pub async fn predict(
    backend: &dyn PredictionBackend,
    request: &PredictionRequest,
    timeout: Duration,
) -> Result<PredictionResponse, PredictionError> {
    let result = run(backend, request, timeout).await;
    if let Err(err) = &result {
        tracing::error!(
            stage = err.stage(),
            raw_output = err.raw_output().unwrap_or(""),
            error = %err,
            "prediction failed"
        );
    }
    result
}

async fn run(
    backend: &dyn PredictionBackend,
    request: &PredictionRequest,
    timeout: Duration,
) -> Result<PredictionResponse, PredictionError> {
    let prompt = build_prompt(request.device_id, &request.records, Utc::now());

    let raw = tokio::time::timeout(timeout, backend.invoke(&prompt.text, prompt.schema))
        .await
        .map_err(|_| PredictionError::BackendTimeout {
            provider: backend.provider(),
            after: timeout,
        })??;

    let result = json::parse(&raw)?;
    warn_on_target_drift(&result, prompt.target_time);

    let response =
        PredictionResponse::assemble(Uuid::new_v4(), request.device_id, result, Utc::now());
    tracing::info!(prediction_id = %response.id, "prediction generated");
    Ok(response)
}

fn warn_on_target_drift(result: &PredictionResult, target_time: DateTime<Utc>) {
    let drift_secs = (result.predicted_for - target_time).num_seconds();
    if drift_secs.abs() > PREDICTED_FOR_TOLERANCE_SECS {
        tracing::warn!(
            predicted_for = %iso8601(result.predicted_for),
            target_time = %iso8601(target_time),
            drift_secs,
            "backend predicted_for differs from requested target"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reading::SensorRecord;
    use crate::llm::Provider;
    use chrono::TimeZone;
    use serde_json::Value;

    const OUTPUT: &str = r#"{"temperature":21.0,"humidity":48.0,"air_quality":9.5,"predicted_for":"2024-01-01T01:00:00Z","confidence":0.8}"#;

    struct StubBackend {
        output: Result<&'static str, ()>,
        delay: Duration,
    }

    impl StubBackend {
        fn returning(output: &'static str) -> Self {
            Self {
                output: Ok(output),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait::async_trait]
    impl PredictionBackend for StubBackend {
        fn provider(&self) -> Provider {
            Provider::Ollama
        }

        async fn invoke(&self, prompt: &str, schema: &Value) -> Result<String, PredictionError> {
            assert!(prompt.contains("11111111-1111-1111-1111-111111111111"));
            assert_eq!(schema["required"].as_array().map(Vec::len), Some(5));
            tokio::time::sleep(self.delay).await;
            self.output
                .map(str::to_string)
                .map_err(|()| PredictionError::BackendUnavailable {
                    provider: Provider::Ollama,
                    stage: "send",
                    detail: "connection refused".to_string(),
                })
        }
    }

    fn request() -> PredictionRequest {
        PredictionRequest {
            device_id: Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap(),
            records: vec![SensorRecord {
                temperature: 20.0,
                humidity: 50.0,
                air_quality: 10.0,
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }],
        }
    }

    #[tokio::test]
    async fn assembles_response_from_backend_output() {
        let backend = StubBackend::returning(OUTPUT);
        let req = request();
        let before = Utc::now();

        let res = predict(&backend, &req, Duration::from_secs(5)).await.unwrap();

        assert_eq!(res.device_id, req.device_id);
        assert_ne!(res.id, req.device_id);
        assert_eq!(res.temperature, 21.0);
        assert_eq!(res.humidity, 48.0);
        assert_eq!(res.air_quality, 9.5);
        assert_eq!(
            res.predicted_for,
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap()
        );
        assert_eq!(res.confidence, 0.8);
        assert!(res.generated_at >= before);
    }

    #[tokio::test]
    async fn identical_requests_get_distinct_ids() {
        let backend = StubBackend::returning(OUTPUT);
        let req = request();
        let a = predict(&backend, &req, Duration::from_secs(5)).await.unwrap();
        let b = predict(&backend, &req, Duration::from_secs(5)).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn malformed_output_fails() {
        let backend = StubBackend::returning("{malformed");
        let err = predict(&backend, &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let backend = StubBackend {
            output: Err(()),
            delay: Duration::ZERO,
        };
        let err = predict(&backend, &request(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::BackendUnavailable { .. }));
    }

    #[tokio::test]
    async fn slow_backend_is_cut_off() {
        let backend = StubBackend {
            output: Ok(OUTPUT),
            delay: Duration::from_secs(5),
        };
        let err = predict(&backend, &request(), Duration::from_millis(50))
            .await
            .unwrap_err();
        match err {
            PredictionError::BackendTimeout { provider, after } => {
                assert_eq!(provider, Provider::Ollama);
                assert_eq!(after, Duration::from_millis(50));
            }
            other => panic!("expected BackendTimeout, got {other:?}"),
        }
    }
}
