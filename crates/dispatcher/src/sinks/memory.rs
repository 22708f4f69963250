//! MemorySink - keeps records in memory
//!
//! Meant for tests and for library users that want to inspect output in
//! process. Cloning shares the same buffer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{DataSink, EgressRecord, TwinError};
use parking_lot::Mutex;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct MemorySink {
    name: String,
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    records: Mutex<Vec<EgressRecord>>,
    open: AtomicBool,
    fail_writes: AtomicBool,
    fail_open: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    flushes: Mutex<u32>,
    closes: Mutex<u32>,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(MemoryInner::default()),
        }
    }

    /// Every `write` fails while set
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// `open` fails while set
    pub fn fail_open(&self, fail: bool) {
        self.inner.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long inside every `write`, to simulate a slow destination
    pub fn set_write_delay(&self, delay: Duration) {
        *self.inner.write_delay.lock() = Some(delay);
    }

    pub fn records(&self) -> Vec<EgressRecord> {
        self.inner.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> u32 {
        *self.inner.flushes.lock()
    }

    pub fn close_count(&self) -> u32 {
        *self.inner.closes.lock()
    }
}

#[async_trait]
impl DataSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open(&self) -> Result<(), TwinError> {
        if self.inner.fail_open.load(Ordering::SeqCst) {
            return Err(TwinError::sink(&self.name, "open refused"));
        }
        self.inner.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn write(&self, record: &EgressRecord) -> Result<(), TwinError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(TwinError::sink(&self.name, "write refused"));
        }
        let delay = *self.inner.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.records.lock().push(record.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<(), TwinError> {
        *self.inner.flushes.lock() += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), TwinError> {
        *self.inner.closes.lock() += 1;
        self.inner.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn health_check(&self) -> Value {
        json!({
            "name": self.name,
            "type": "memory",
            "status": if self.is_open() { "ok" } else { "closed" },
            "records_written": self.len(),
        })
    }
}
