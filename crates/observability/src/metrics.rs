//! Runtime counters
//!
//! `RuntimeMetrics` is built once by the runtime and shared by `Arc` with every
//! component that updates it. Each update is mirrored to the `metrics` facade so
//! a Prometheus exporter, when installed, sees the same numbers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use parking_lot::Mutex;
use serde::Serialize;

/// Shared runtime counters
#[derive(Debug)]
pub struct RuntimeMetrics {
    messages_received: AtomicU64,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
    processing_errors: AtomicU64,
    sink_write_errors: AtomicU64,
    connection_errors: AtomicU64,
    start_time: DateTime<Utc>,
    started: Instant,
    last_message_time: Mutex<Option<DateTime<Utc>>>,
    last_error_time: Mutex<Option<DateTime<Utc>>>,
}

impl Default for RuntimeMetrics {
    fn default() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            processing_errors: AtomicU64::new(0),
            sink_write_errors: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
            start_time: Utc::now(),
            started: Instant::now(),
            last_message_time: Mutex::new(None),
            last_error_time: Mutex::new(None),
        }
    }
}

impl RuntimeMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message handed over by the connector
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        *self.last_message_time.lock() = Some(Utc::now());
        counter!("edge_twin_messages_received_total").increment(1);
    }

    /// Record a message that went through transform and fan-out
    pub fn record_processed(&self, latency_ms: f64) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        counter!("edge_twin_messages_processed_total").increment(1);
        histogram!("edge_twin_processing_latency_ms").record(latency_ms);
    }

    /// Record messages lost to queue overflow
    pub fn record_dropped(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.messages_dropped.fetch_add(count, Ordering::Relaxed);
        counter!("edge_twin_messages_dropped_total").increment(count);
    }

    pub fn record_processing_error(&self) {
        self.processing_errors.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
        counter!("edge_twin_processing_errors_total").increment(1);
    }

    pub fn record_sink_write_error(&self, sink: &str) {
        self.sink_write_errors.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
        counter!("edge_twin_sink_write_errors_total", "sink" => sink.to_string()).increment(1);
    }

    pub fn record_connection_error(&self) {
        self.connection_errors.fetch_add(1, Ordering::Relaxed);
        self.touch_error();
        counter!("edge_twin_connection_errors_total").increment(1);
    }

    /// Current queue depth
    pub fn record_queue_depth(&self, depth: usize) {
        gauge!("edge_twin_queue_depth").set(depth as f64);
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    pub fn processing_errors(&self) -> u64 {
        self.processing_errors.load(Ordering::Relaxed)
    }

    pub fn sink_write_errors(&self) -> u64 {
        self.sink_write_errors.load(Ordering::Relaxed)
    }

    pub fn connection_errors(&self) -> u64 {
        self.connection_errors.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Average processed messages per second since start
    pub fn processing_rate(&self) -> f64 {
        let uptime = self.uptime_seconds();
        if uptime <= 0.0 {
            return 0.0;
        }
        self.messages_processed() as f64 / uptime
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received(),
            messages_processed: self.messages_processed(),
            messages_dropped: self.messages_dropped(),
            processing_errors: self.processing_errors(),
            sink_write_errors: self.sink_write_errors(),
            connection_errors: self.connection_errors(),
            uptime_seconds: self.uptime_seconds(),
            processing_rate: (self.processing_rate() * 100.0).round() / 100.0,
            start_time: self.start_time,
            last_message_time: *self.last_message_time.lock(),
            last_error_time: *self.last_error_time.lock(),
        }
    }

    fn touch_error(&self) {
        *self.last_error_time.lock() = Some(Utc::now());
    }
}

/// Snapshot of runtime metrics (for reporting)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_processed: u64,
    pub messages_dropped: u64,
    pub processing_errors: u64,
    pub sink_write_errors: u64,
    pub connection_errors: u64,
    pub uptime_seconds: f64,
    /// Messages per second, two decimals
    pub processing_rate: f64,
    pub start_time: DateTime<Utc>,
    pub last_message_time: Option<DateTime<Utc>>,
    pub last_error_time: Option<DateTime<Utc>>,
}
