use crate::domain::contract::prediction_schema;
use crate::domain::reading::SensorRecord;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

pub const FORECAST_HORIZON_HOURS: i64 = 1;

pub const SYSTEM_PROMPT: &str = "\
You forecast environmental sensor readings for a single device.
Return ONLY one JSON object with the keys temperature, humidity, air_quality, predicted_for and confidence.
Do not wrap the JSON in markdown. Do not add prose.";

#[derive(Debug, Clone)]
pub struct Prompt {
    pub text: String,
    pub schema: &'static Value,
    pub target_time: DateTime<Utc>,
}

pub fn iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn build_prompt(device_id: Uuid, records: &[SensorRecord], now: DateTime<Utc>) -> Prompt {
    let target_time = now + Duration::hours(FORECAST_HORIZON_HOURS);

    // Plain f64/DateTime fields only, so serialization cannot fail.
    let records_json = serde_json::to_string(records).expect("sensor records serialize failed");

    let text = format!(
        "Analyze these {count} sensor records for device {device_id}: {records_json}\n\
Current time is {now}.\n\
Predict the temperature, humidity and air_quality values for exactly one hour from now.\n\
The \"predicted_for\" field MUST be exactly \"{target}\".\n\
The \"confidence\" field MUST be a number between 0 and 1.",
        count = records.len(),
        now = iso8601(now),
        target = iso8601(target_time),
    );

    Prompt {
        text,
        schema: prediction_schema(),
        target_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(minute: u32, temperature: f64) -> SensorRecord {
        SensorRecord {
            temperature,
            humidity: 50.0,
            air_quality: 10.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, minute, 0).unwrap(),
        }
    }

    fn device() -> Uuid {
        Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap()
    }

    #[test]
    fn target_time_is_one_hour_after_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 15).unwrap();
        for n in [0usize, 1, 60] {
            let records: Vec<_> = (0..n).map(|i| record((i % 60) as u32, 20.0)).collect();
            let prompt = build_prompt(device(), &records, now);
            assert_eq!(prompt.target_time, Utc.with_ymd_and_hms(2024, 1, 1, 1, 30, 15).unwrap());
            assert_eq!(prompt.schema["required"].as_array().unwrap().len(), 5);
        }
    }

    #[test]
    fn embeds_device_times_and_records() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prompt = build_prompt(device(), &[record(0, 20.0)], now);

        assert!(prompt.text.contains("11111111-1111-1111-1111-111111111111"));
        assert!(prompt.text.contains("Current time is 2024-01-01T00:00:00Z"));
        assert!(prompt.text.contains("for exactly one hour from now"));
        assert!(prompt.text.contains("\"2024-01-01T01:00:00Z\""));
        assert!(prompt.text.contains(
            r#"[{"temperature":20.0,"humidity":50.0,"air_quality":10.0,"timestamp":"2024-01-01T00:00:00Z"}]"#
        ));
    }

    #[test]
    fn preserves_record_order() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        // Deliberately out of chronological order.
        let records = [record(30, 23.5), record(10, 21.5), record(20, 22.5)];
        let prompt = build_prompt(device(), &records, now);

        let a = prompt.text.find("23.5").unwrap();
        let b = prompt.text.find("21.5").unwrap();
        let c = prompt.text.find("22.5").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn empty_records_pass_through() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let prompt = build_prompt(device(), &[], now);
        assert!(prompt.text.contains("Analyze these 0 sensor records"));
        assert!(prompt.text.contains(": []\n"));
    }

    #[test]
    fn keeps_subsecond_precision_in_target() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + Duration::milliseconds(250);
        let prompt = build_prompt(device(), &[], now);
        assert!(prompt.text.contains("\"2024-01-01T01:00:00.250Z\""));
    }
}
