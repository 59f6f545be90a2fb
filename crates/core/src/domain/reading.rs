use crate::domain::contract::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One observation from a device. Field order is the order used when the
/// record is serialized into a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub temperature: f64,
    pub humidity: f64,
    pub air_quality: f64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub device_id: Uuid,
    pub records: Vec<SensorRecord>,
}

/// Same leniency as model output: offset-less timestamps are read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_timestamp(&s)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {s:?}")))
}
