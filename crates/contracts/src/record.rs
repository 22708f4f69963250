//! Transform output and sink record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::IngressEnvelope;

/// Keys every transform output must provide
pub const REQUIRED_OUTPUT_KEYS: [&str; 3] = ["raw_value", "twin_estimate", "anomaly_flag"];

/// Twin identity stamped on every record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwinIdentity {
    pub twin_id: String,
    pub asset_id: String,
    pub model_version: String,
}

/// Result of one transform invocation
///
/// Required keys are optional at the type level so that an incomplete output
/// can be detected and backfilled instead of rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin_estimate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_flag: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Additional numeric/string fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelOutput {
    /// Output with all required keys present
    pub fn new(raw_value: f64, twin_estimate: f64, anomaly_flag: bool) -> Self {
        Self {
            raw_value: Some(raw_value),
            twin_estimate: Some(twin_estimate),
            anomaly_flag: Some(anomaly_flag),
            ..Self::default()
        }
    }

    pub fn with_residual(mut self, residual: f64) -> Self {
        self.residual = Some(residual);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Names of required keys that are absent
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let present = [
            self.raw_value.is_some(),
            self.twin_estimate.is_some(),
            self.anomaly_flag.is_some(),
        ];
        REQUIRED_OUTPUT_KEYS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Fill absent required keys from the envelope; returns what was filled
    pub fn backfill(&mut self, envelope: &IngressEnvelope) -> Vec<&'static str> {
        let missing = self.missing_keys();
        self.raw_value.get_or_insert(envelope.value);
        self.twin_estimate.get_or_insert(envelope.value);
        self.anomaly_flag.get_or_insert(false);
        missing
    }
}

/// Unit of delivery handed to every sink
///
/// Shared read-only across sinks once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgressRecord {
    pub asset_id: String,
    pub twin_id: String,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub raw_value: f64,
    pub twin_estimate: f64,
    pub anomaly_flag: bool,
    pub residual: Option<f64>,
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EgressRecord {
    /// Merge identity, envelope timestamps and transform output
    ///
    /// Required keys still missing from `output` default from the envelope.
    pub fn build(identity: &TwinIdentity, envelope: &IngressEnvelope, output: ModelOutput) -> Self {
        Self {
            asset_id: identity.asset_id.clone(),
            twin_id: identity.twin_id.clone(),
            model_version: identity.model_version.clone(),
            timestamp: envelope.timestamp,
            processed_at: Utc::now(),
            raw_value: output.raw_value.unwrap_or(envelope.value),
            twin_estimate: output.twin_estimate.unwrap_or(envelope.value),
            anomaly_flag: output.anomaly_flag.unwrap_or(false),
            residual: output.residual,
            confidence: output.confidence,
            extra: output.extra,
        }
    }

    /// Flat JSON object view, used by field-selecting sinks
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
