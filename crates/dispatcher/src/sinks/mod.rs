//! Sink implementations
//!
//! Contains StdoutSink, CsvSink, LogSink and MemorySink.

mod csv;
mod log;
mod memory;
mod stdout;

use std::collections::HashMap;

use contracts::TwinError;

pub use self::csv::{CsvSink, CsvSinkConfig, DEFAULT_COLUMNS};
pub use self::log::LogSink;
pub use self::memory::MemorySink;
pub use self::stdout::{StdoutSink, StdoutSinkConfig};

/// Boolean sink param: true/false, yes/no, on/off, 1/0
pub(crate) fn param_bool(
    sink: &str,
    params: &HashMap<String, String>,
    key: &str,
    default: bool,
) -> Result<bool, TwinError> {
    let Some(raw) = params.get(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(TwinError::sink(sink, format!("param '{key}' must be a boolean, got '{raw}'"))
            .with_detail("param", key)),
    }
}

/// Comma separated list param; blank entries are skipped
pub(crate) fn param_list(params: &HashMap<String, String>, key: &str) -> Option<Vec<String>> {
    params.get(key).map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};
    use contracts::EgressRecord;
    use serde_json::Map;

    pub fn record(raw_value: f64) -> EgressRecord {
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap();
        EgressRecord {
            asset_id: "motor-001".into(),
            twin_id: "motor-twin".into(),
            model_version: "1.0.0".into(),
            timestamp,
            processed_at: timestamp,
            raw_value,
            twin_estimate: raw_value / 2.0,
            anomaly_flag: false,
            residual: Some(raw_value / 2.0),
            confidence: None,
            extra: Map::new(),
        }
    }
}
