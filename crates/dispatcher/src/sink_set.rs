//! SinkSet - ordered fan-out with isolated failures
//!
//! Every record goes to every sink in list order. A failing sink is logged and
//! counted, the remaining sinks still receive the record.

use std::sync::Arc;

use contracts::{DataSink, EgressRecord, TwinError};
use observability::RuntimeMetrics;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::{SinkMetrics, SinkMetricsSnapshot};
use crate::sinks::StdoutSink;

struct SinkEntry {
    sink: Arc<dyn DataSink>,
    metrics: Arc<SinkMetrics>,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub delivered: usize,
    pub failed: usize,
}

pub struct SinkSet {
    entries: Vec<SinkEntry>,
    runtime_metrics: Arc<RuntimeMetrics>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Arc<dyn DataSink>>, runtime_metrics: Arc<RuntimeMetrics>) -> Self {
        let entries = sinks
            .into_iter()
            .map(|sink| SinkEntry {
                sink,
                metrics: Arc::new(SinkMetrics::new()),
            })
            .collect();
        Self {
            entries,
            runtime_metrics,
        }
    }

    /// Like `new`, but installs a stdout sink when `sinks` is empty
    pub fn with_default(sinks: Vec<Arc<dyn DataSink>>, runtime_metrics: Arc<RuntimeMetrics>) -> Self {
        if sinks.is_empty() {
            info!("no sinks configured, using stdout");
            return Self::new(vec![Arc::new(StdoutSink::default())], runtime_metrics);
        }
        Self::new(sinks, runtime_metrics)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.sink.name()).collect()
    }

    /// Open every sink in order
    ///
    /// On the first failure the sinks already opened are closed (in reverse
    /// order) and a `Sink` error naming the failed sink is returned.
    #[instrument(name = "sink_set_open_all", skip(self), fields(sink_count = self.entries.len()))]
    pub async fn open_all(&self) -> Result<(), TwinError> {
        for (idx, entry) in self.entries.iter().enumerate() {
            let name = entry.sink.name();
            if let Err(e) = entry.sink.open().await {
                error!(sink = %name, error = %e, "Failed to open sink, rolling back");
                for opened in self.entries[..idx].iter().rev() {
                    if let Err(close_err) = opened.sink.close().await {
                        warn!(sink = %opened.sink.name(), error = %close_err, "Rollback close failed");
                    }
                }
                return Err(TwinError::sink(name, format!("failed to open sink '{name}': {e}")));
            }
            debug!(sink = %name, "Sink opened");
        }
        info!(sinks = ?self.names(), "All sinks opened");
        Ok(())
    }

    /// Write one record to every sink
    pub async fn write_all(&self, record: &EgressRecord) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();
        for entry in &self.entries {
            match entry.sink.write(record).await {
                Ok(()) => {
                    entry.metrics.inc_write_count();
                    outcome.delivered += 1;
                }
                Err(e) => {
                    entry.metrics.inc_failure_count();
                    self.runtime_metrics.record_sink_write_error(entry.sink.name());
                    outcome.failed += 1;
                    error!(
                        sink = %entry.sink.name(),
                        twin_id = %record.twin_id,
                        error = %e,
                        "Write failed"
                    );
                    // Continue with the next sink
                }
            }
        }
        outcome
    }

    /// Flush then close every sink, each independently
    #[instrument(name = "sink_set_shutdown", skip(self), fields(sink_count = self.entries.len()))]
    pub async fn shutdown(&self) {
        for entry in &self.entries {
            let name = entry.sink.name();
            if let Err(e) = entry.sink.flush().await {
                entry.metrics.inc_shutdown_failures();
                error!(sink = %name, error = %e, "Flush failed on shutdown");
            }
            if let Err(e) = entry.sink.close().await {
                entry.metrics.inc_shutdown_failures();
                error!(sink = %name, error = %e, "Close failed on shutdown");
            }
        }
        debug!("Sink set shutdown complete");
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, SinkMetricsSnapshot)> {
        self.entries
            .iter()
            .map(|e| (e.sink.name().to_string(), e.metrics.snapshot()))
            .collect()
    }

    /// Per-sink health merged with write/failure counters
    pub async fn health_check(&self) -> Value {
        let mut sinks = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut health = entry.sink.health_check().await;
            if let Value::Object(map) = &mut health {
                let snapshot = entry.metrics.snapshot();
                map.insert("write_count".into(), json!(snapshot.write_count));
                map.insert("failure_count".into(), json!(snapshot.failure_count));
            }
            sinks.push(health);
        }
        Value::Array(sinks)
    }
}
