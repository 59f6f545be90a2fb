use crate::domain::prediction::PredictionResult;
use anyhow::ensure;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    /// ISO-8601 string.
    Timestamp,
}

impl FieldKind {
    fn json_type(self) -> &'static str {
        match self {
            FieldKind::Number => "number",
            FieldKind::Timestamp => "string",
        }
    }
}

/// Every field the backend must return, in output order.
pub const PREDICTION_FIELDS: [(&str, FieldKind); 5] = [
    ("temperature", FieldKind::Number),
    ("humidity", FieldKind::Number),
    ("air_quality", FieldKind::Number),
    ("predicted_for", FieldKind::Timestamp),
    ("confidence", FieldKind::Number),
];

/// JSON-Schema handed to the backend's structured-output mechanism.
pub fn prediction_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let mut properties = Map::new();
        for (name, kind) in PREDICTION_FIELDS {
            properties.insert(
                name.to_string(),
                serde_json::json!({ "type": kind.json_type() }),
            );
        }
        let required: Vec<&str> = PREDICTION_FIELDS.iter().map(|(name, _)| *name).collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    })
}

/// Startup check that a schema requires exactly the prediction fields with the
/// expected types.
pub fn validate_schema(schema: &Value) -> anyhow::Result<()> {
    ensure!(
        schema.get("type").and_then(Value::as_str) == Some("object"),
        "prediction schema must describe an object"
    );

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow::anyhow!("prediction schema has no properties"))?;
    ensure!(
        properties.len() == PREDICTION_FIELDS.len(),
        "prediction schema must declare exactly {} properties (got {})",
        PREDICTION_FIELDS.len(),
        properties.len()
    );

    let required: BTreeSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    for (name, kind) in PREDICTION_FIELDS {
        let declared = properties
            .get(name)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str);
        ensure!(
            declared == Some(kind.json_type()),
            "prediction schema property {name} must have type {}",
            kind.json_type()
        );
        ensure!(
            required.contains(name),
            "prediction schema must list {name} as required"
        );
    }
    ensure!(
        required.len() == PREDICTION_FIELDS.len(),
        "prediction schema lists unexpected required fields"
    );

    Ok(())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field `{field}` {detail}")]
pub struct FieldViolation {
    pub field: &'static str,
    pub detail: String,
}

impl FieldViolation {
    fn new(field: &'static str, detail: impl Into<String>) -> Self {
        Self {
            field,
            detail: detail.into(),
        }
    }
}

/// Maps backend JSON onto a [`PredictionResult`] one field at a time. Keys
/// outside the contract are ignored.
pub fn validate_and_into_result(value: &Value) -> Result<PredictionResult, FieldViolation> {
    let obj = value
        .as_object()
        .ok_or_else(|| FieldViolation::new("$", format!("must be an object (got {})", kind_of(value))))?;

    let temperature = number(obj, "temperature")?;
    let humidity = number(obj, "humidity")?;
    let air_quality = number(obj, "air_quality")?;
    let predicted_for = timestamp(obj, "predicted_for")?;

    let confidence = number(obj, "confidence")?;
    if !(0.0..=1.0).contains(&confidence) {
        return Err(FieldViolation::new(
            "confidence",
            format!("must be between 0 and 1 (got {confidence})"),
        ));
    }

    Ok(PredictionResult {
        temperature,
        humidity,
        air_quality,
        predicted_for,
        confidence,
    })
}

/// Accepts RFC 3339 and offset-less ISO-8601 (read as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn number(obj: &Map<String, Value>, field: &'static str) -> Result<f64, FieldViolation> {
    let value = obj
        .get(field)
        .ok_or_else(|| FieldViolation::new(field, "is missing"))?;
    value
        .as_f64()
        .filter(|n| n.is_finite())
        .ok_or_else(|| FieldViolation::new(field, format!("must be a number (got {})", kind_of(value))))
}

fn timestamp(obj: &Map<String, Value>, field: &'static str) -> Result<DateTime<Utc>, FieldViolation> {
    let value = obj
        .get(field)
        .ok_or_else(|| FieldViolation::new(field, "is missing"))?;
    let s = value.as_str().ok_or_else(|| {
        FieldViolation::new(field, format!("must be a string (got {})", kind_of(value)))
    })?;
    parse_timestamp(s)
        .ok_or_else(|| FieldViolation::new(field, format!("is not an ISO-8601 timestamp: {s:?}")))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
