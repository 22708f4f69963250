//! StdoutSink - JSON lines on standard output

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use contracts::{DataSink, EgressRecord, TwinError};
use serde_json::{json, Map, Value};

use super::{param_bool, param_list};

#[derive(Debug, Clone, Default)]
pub struct StdoutSinkConfig {
    /// Indented output
    pub pretty: bool,
    /// Only these fields (takes precedence over `exclude_fields`)
    pub include_fields: Option<HashSet<String>>,
    pub exclude_fields: HashSet<String>,
}

impl StdoutSinkConfig {
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, TwinError> {
        Ok(Self {
            pretty: param_bool(name, params, "pretty", false)?,
            include_fields: param_list(params, "include_fields")
                .filter(|fields| !fields.is_empty())
                .map(|fields| fields.into_iter().collect()),
            exclude_fields: param_list(params, "exclude_fields")
                .unwrap_or_default()
                .into_iter()
                .collect(),
        })
    }
}

/// Prints every record as one JSON document
#[derive(Debug)]
pub struct StdoutSink {
    name: String,
    config: StdoutSinkConfig,
    records_written: AtomicU64,
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new("stdout", StdoutSinkConfig::default())
    }
}

impl StdoutSink {
    pub fn new(name: impl Into<String>, config: StdoutSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            records_written: AtomicU64::new(0),
        }
    }

    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Result<Self, TwinError> {
        Ok(Self::new(name, StdoutSinkConfig::from_params(name, params)?))
    }

    /// Filtered JSON text for one record
    pub fn render(&self, record: &EgressRecord) -> Result<String, TwinError> {
        let fields = self.filter(record.to_json_map());
        let rendered = if self.config.pretty {
            serde_json::to_string_pretty(&fields)
        } else {
            serde_json::to_string(&fields)
        };
        rendered.map_err(|e| TwinError::sink(&self.name, format!("failed to encode record: {e}")))
    }

    fn filter(&self, fields: Map<String, Value>) -> Map<String, Value> {
        if let Some(include) = &self.config.include_fields {
            return fields
                .into_iter()
                .filter(|(k, _)| include.contains(k))
                .collect();
        }
        if self.config.exclude_fields.is_empty() {
            return fields;
        }
        fields
            .into_iter()
            .filter(|(k, _)| !self.config.exclude_fields.contains(k))
            .collect()
    }
}

#[async_trait]
impl DataSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), TwinError> {
        Ok(())
    }

    async fn write(&self, record: &EgressRecord) -> Result<(), TwinError> {
        let line = self.render(record)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").and_then(|()| out.flush())?;
        self.records_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<(), TwinError> {
        std::io::stdout().flush()?;
        Ok(())
    }

    async fn close(&self) -> Result<(), TwinError> {
        Ok(())
    }

    async fn health_check(&self) -> Value {
        json!({
            "name": self.name,
            "type": "stdout",
            "status": "ok",
            "records_written": self.records_written.load(Ordering::Relaxed),
        })
    }
}
