//! Runtime statistics

use contracts::{QueueStats, RuntimeState};
use dispatcher::SinkMetricsSnapshot;
use observability::MetricsSnapshot;
use serde::Serialize;
use serde_json::Value;

/// Per-sink counters
#[derive(Debug, Clone, Serialize)]
pub struct SinkStats {
    pub name: String,
    #[serde(flatten)]
    pub counters: SinkMetricsSnapshot,
}

/// Point-in-time view of a runtime
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStats {
    pub twin_id: String,
    pub asset_id: String,
    pub state: RuntimeState,
    pub workers: usize,
    pub sinks: Vec<SinkStats>,
    /// `None` before the first start
    pub queue: Option<QueueStats>,
    pub metrics: MetricsSnapshot,
    pub connector: Value,
    /// Transform internals, when the block exposes them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<Value>,
}

impl RuntimeStats {
    /// Dropped messages as a percentage of received ones
    pub fn drop_rate(&self) -> f64 {
        if self.metrics.messages_received > 0 {
            (self.metrics.messages_dropped as f64 / self.metrics.messages_received as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn sink_failures(&self) -> u64 {
        self.sinks.iter().map(|s| s.counters.failure_count).sum()
    }
}
