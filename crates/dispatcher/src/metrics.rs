//! Per-sink metrics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful writes
    write_count: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
    /// Failed flush/close calls during shutdown
    shutdown_failures: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total write count
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Increment write count
    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn shutdown_failures(&self) -> u64 {
        self.shutdown_failures.load(Ordering::Relaxed)
    }

    pub fn inc_shutdown_failures(&self) {
        self.shutdown_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            shutdown_failures: self.shutdown_failures(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SinkMetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
    pub shutdown_failures: u64,
}
