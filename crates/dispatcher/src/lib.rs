//! # Dispatcher
//!
//! Sink set fan-out.
//!
//! Responsibilities:
//! - Resolve `[[sinks]]` entries through `SinkRegistry`
//! - Open all sinks before processing, rolling back on failure
//! - Fan out each `EgressRecord` to every sink, isolating failures
//! - Flush and close every sink on shutdown

pub mod metrics;
pub mod registry;
pub mod sink_set;
pub mod sinks;

pub use contracts::{DataSink, EgressRecord};
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use registry::{SinkFactory, SinkRegistry};
pub use sink_set::{SinkSet, WriteOutcome};
pub use sinks::{CsvSink, CsvSinkConfig, LogSink, MemorySink, StdoutSink, StdoutSinkConfig};
