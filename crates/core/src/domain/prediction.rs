use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validated model output, before it is stamped with server-side identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality: f64,
    pub predicted_for: DateTime<Utc>,
    pub confidence: f64,
}

/// Row shape of the downstream `predictions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub id: Uuid,
    pub device_id: Uuid,
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality: f64,
    pub predicted_for: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub confidence: f64,
}

impl PredictionResponse {
    pub fn assemble(
        id: Uuid,
        device_id: Uuid,
        result: PredictionResult,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            device_id,
            temperature: result.temperature,
            humidity: result.humidity,
            air_quality: result.air_quality,
            predicted_for: result.predicted_for,
            generated_at,
            confidence: result.confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn serializes_with_table_column_names() {
        let predicted_for = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let generated_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();
        let result = PredictionResult {
            temperature: 21.0,
            humidity: 48.0,
            air_quality: 9.5,
            predicted_for,
            confidence: 0.8,
        };

        let response =
            PredictionResponse::assemble(Uuid::nil(), Uuid::nil(), result, generated_at);
        let v = serde_json::to_value(&response).unwrap();
        let obj = v.as_object().unwrap();

        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "air_quality",
                "confidence",
                "device_id",
                "generated_at",
                "humidity",
                "id",
                "predicted_for",
                "temperature"
            ]
        );
        assert_eq!(obj["predicted_for"], "2024-01-01T01:00:00Z");
        assert_eq!(obj["generated_at"], "2024-01-01T00:00:05Z");
        assert_eq!(obj["air_quality"], 9.5);
    }
}
