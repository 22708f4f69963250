//! DataSink trait - Sink Set output interface
//!
//! Sinks are stored as trait objects and written to from several workers at
//! once, so every method takes `&self`.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{EgressRecord, TwinError};

/// Data output trait
///
/// All sink implementations must implement this trait.
#[async_trait]
pub trait DataSink: Send + Sync {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Acquire resources; called once before the first write
    async fn open(&self) -> Result<(), TwinError>;

    /// Write one record
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&self, record: &EgressRecord) -> Result<(), TwinError>;

    /// Flush buffer (if any)
    async fn flush(&self) -> Result<(), TwinError>;

    /// Close sink
    async fn close(&self) -> Result<(), TwinError>;

    /// Sink-specific status
    async fn health_check(&self) -> Value {
        json!({ "name": self.name() })
    }
}
