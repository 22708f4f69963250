//! Inbound message types
//!
//! `InboundMessage` is what the connector hands to the runtime; `IngressEnvelope`
//! is the lenient, typed view a worker builds from it before calling the transform.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys lifted out of the raw payload into typed envelope fields
const ENVELOPE_KEYS: [&str; 5] = ["asset_id", "timestamp", "value", "unit", "metadata"];

/// Asset id used when the payload does not carry one
pub const UNKNOWN_ASSET: &str = "unknown";

/// Raw JSON object received on a topic, stamped with the dispatch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Concrete topic the message arrived on
    pub topic: String,
    /// Decoded JSON object
    pub payload: Map<String, Value>,
    /// Time the connector dispatched the message
    pub received_at: DateTime<Utc>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            topic: topic.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Typed view over an inbound payload
///
/// Parsing never fails: missing or malformed fields fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngressEnvelope {
    pub topic: String,
    pub asset_id: String,
    /// Measurement time (falls back to ingestion time)
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: Option<String>,
    /// Every payload key that is not a typed field, merged with an explicit `metadata` object
    pub metadata: Map<String, Value>,
    /// Untouched payload
    pub raw: Map<String, Value>,
    pub ingested_at: DateTime<Utc>,
}

impl IngressEnvelope {
    /// Build an envelope from a dispatched message
    pub fn parse(message: &InboundMessage) -> Self {
        Self::from_payload(&message.topic, &message.payload, message.received_at)
    }

    /// Build an envelope from a raw payload
    pub fn from_payload(
        topic: &str,
        payload: &Map<String, Value>,
        ingested_at: DateTime<Utc>,
    ) -> Self {
        let asset_id = payload
            .get("asset_id")
            .and_then(value_as_string)
            .unwrap_or_else(|| UNKNOWN_ASSET.to_string());

        let timestamp = payload
            .get("timestamp")
            .and_then(parse_timestamp)
            .unwrap_or(ingested_at);

        let value = payload.get("value").and_then(value_as_f64).unwrap_or(0.0);

        let unit = payload
            .get("unit")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut metadata: Map<String, Value> = payload
            .iter()
            .filter(|(k, _)| !ENVELOPE_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(Value::Object(explicit)) = payload.get("metadata") {
            for (k, v) in explicit {
                metadata.insert(k.clone(), v.clone());
            }
        }

        Self {
            topic: topic.to_string(),
            asset_id,
            timestamp,
            value,
            unit,
            metadata,
            raw: payload.clone(),
            ingested_at,
        }
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers and numeric strings are accepted
pub fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// RFC 3339 strings (with `Z` or offset), naive ISO strings (read as UTC)
/// and Unix seconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => {
            let secs = n.as_f64()?;
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_full_payload() {
        let raw = payload(json!({
            "asset_id": "motor-001",
            "timestamp": "2024-01-15T10:30:00Z",
            "value": 42.5,
            "unit": "celsius",
            "sensor": "pt100"
        }));
        let env = IngressEnvelope::from_payload("sensors/motor-001/temperature", &raw, Utc::now());

        assert_eq!(env.asset_id, "motor-001");
        assert_eq!(env.value, 42.5);
        assert_eq!(env.unit.as_deref(), Some("celsius"));
        assert_eq!(env.timestamp.to_rfc3339(), "2024-01-15T10:30:00+00:00");
        assert_eq!(env.metadata.get("sensor"), Some(&json!("pt100")));
        assert!(!env.metadata.contains_key("value"));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let now = Utc::now();
        let env = IngressEnvelope::from_payload("t", &Map::new(), now);

        assert_eq!(env.asset_id, UNKNOWN_ASSET);
        assert_eq!(env.value, 0.0);
        assert_eq!(env.timestamp, now);
        assert!(env.unit.is_none());
    }

    #[test]
    fn test_malformed_fields_fall_back() {
        let now = Utc::now();
        let raw = payload(json!({"value": "not-a-number", "timestamp": "yesterday"}));
        let env = IngressEnvelope::from_payload("t", &raw, now);

        assert_eq!(env.value, 0.0);
        assert_eq!(env.timestamp, now);
    }

    #[test]
    fn test_numeric_string_and_unix_timestamp() {
        let raw = payload(json!({"value": "12.5", "timestamp": 1_700_000_000.5}));
        let env = IngressEnvelope::from_payload("t", &raw, Utc::now());

        assert_eq!(env.value, 12.5);
        assert_eq!(env.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(env.timestamp.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_explicit_metadata_is_merged() {
        let raw = payload(json!({"value": 1, "metadata": {"site": "plant-a"}, "extra": true}));
        let env = IngressEnvelope::from_payload("t", &raw, Utc::now());

        assert_eq!(env.metadata.get("site"), Some(&json!("plant-a")));
        assert_eq!(env.metadata.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let ts = parse_timestamp(&json!("2024-01-15T10:30:00.250")).unwrap();
        assert_eq!(ts.timestamp_subsec_millis(), 250);
    }
}
