//! LogSink - logs record summary via tracing

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use contracts::{DataSink, EgressRecord, TwinError};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

/// Sink that logs record summaries for debugging
pub struct LogSink {
    name: String,
    records: AtomicU64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: AtomicU64::new(0),
        }
    }

    fn log_record_summary(&self, record: &EgressRecord) {
        if record.anomaly_flag {
            warn!(
                sink = %self.name,
                asset_id = %record.asset_id,
                raw_value = record.raw_value,
                twin_estimate = record.twin_estimate,
                residual = ?record.residual,
                "Anomalous record"
            );
        } else {
            info!(
                sink = %self.name,
                asset_id = %record.asset_id,
                raw_value = record.raw_value,
                twin_estimate = record.twin_estimate,
                residual = ?record.residual,
                "Record received"
            );
        }
    }
}

#[async_trait]
impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), TwinError> {
        Ok(())
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, record),
        fields(sink = %self.name, twin_id = %record.twin_id)
    )]
    async fn write(&self, record: &EgressRecord) -> Result<(), TwinError> {
        self.log_record_summary(record);
        self.records.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn flush(&self) -> Result<(), TwinError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&self) -> Result<(), TwinError> {
        info!(
            sink = %self.name,
            records = self.records.load(Ordering::Relaxed),
            "LogSink closed"
        );
        Ok(())
    }

    async fn health_check(&self) -> Value {
        json!({
            "name": self.name,
            "type": "log",
            "status": "ok",
            "records_written": self.records.load(Ordering::Relaxed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::test_support::record;

    #[tokio::test]
    async fn test_log_sink_write() {
        let sink = LogSink::new("test_log");
        let mut anomalous = record(9.0);
        anomalous.anomaly_flag = true;

        assert!(sink.write(&record(1.0)).await.is_ok());
        assert!(sink.write(&anomalous).await.is_ok());
        assert_eq!(sink.health_check().await["records_written"], 2);
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
