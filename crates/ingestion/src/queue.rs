//! Bounded queue with overflow policies
//!
//! Decouples the ingest path from the worker pool. A mutex guards the buffer,
//! two `Notify`s wake waiting producers/consumers.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use contracts::{OverflowPolicy, QueueStats, TwinError};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Fixed-capacity FIFO
///
/// Invariant: `0 <= size() <= capacity()` for every observer.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
    dropped: AtomicU64,
    total_put: AtomicU64,
}

impl<T> BoundedQueue<T> {
    /// Create a queue; zero capacity is rejected
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Result<Self, TwinError> {
        if capacity == 0 {
            return Err(TwinError::configuration("queue capacity must be greater than 0")
                .with_detail("capacity", capacity));
        }
        Ok(Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            dropped: AtomicU64::new(0),
            total_put: AtomicU64::new(0),
        })
    }

    /// Create a queue from a policy name
    pub fn with_policy_name(capacity: usize, policy: &str) -> Result<Self, TwinError> {
        Self::new(capacity, policy.parse()?)
    }

    /// Offer an item
    ///
    /// - `drop_oldest`: evicts the head when full, always `Ok(true)`
    /// - `drop_newest`: `Ok(false)` when full
    /// - `block`: waits up to `timeout` (`None` waits forever), then fails with
    ///   `QueueOverflow`
    pub async fn put(&self, item: T, timeout: Option<Duration>) -> Result<bool, TwinError> {
        self.total_put.fetch_add(1, Ordering::Relaxed);

        match self.policy {
            OverflowPolicy::DropOldest => {
                {
                    let mut items = self.items.lock();
                    if items.len() >= self.capacity {
                        items.pop_front();
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    items.push_back(item);
                }
                self.not_empty.notify_one();
                Ok(true)
            }
            OverflowPolicy::DropNewest => {
                {
                    let mut items = self.items.lock();
                    if items.len() >= self.capacity {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return Ok(false);
                    }
                    items.push_back(item);
                }
                self.not_empty.notify_one();
                Ok(true)
            }
            OverflowPolicy::Block => self.put_blocking(item, timeout).await,
        }
    }

    async fn put_blocking(&self, item: T, timeout: Option<Duration>) -> Result<bool, TwinError> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut items = self.items.lock();
                if items.len() < self.capacity {
                    items.push_back(item);
                    drop(items);
                    self.not_empty.notify_one();
                    return Ok(true);
                }
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        let mut items = self.items.lock();
                        if items.len() < self.capacity {
                            items.push_back(item);
                            drop(items);
                            self.not_empty.notify_one();
                            return Ok(true);
                        }
                        let size = items.len();
                        drop(items);
                        let timeout_ms = timeout.map(|t| t.as_millis()).unwrap_or_default();
                        return Err(TwinError::queue_overflow(format!(
                            "queue still full after {timeout_ms}ms"
                        ))
                        .with_detail("timeout_ms", timeout_ms)
                        .with_detail("size", size));
                    }
                }
            }
        }
    }

    /// Take the oldest item, waiting up to `timeout` (`None` waits forever)
    pub async fn get(&self, timeout: Option<Duration>) -> Option<T> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_get() {
                return Some(item);
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return self.try_get();
                    }
                }
            }
        }
    }

    /// Take the oldest item without waiting
    pub fn try_get(&self) -> Option<T> {
        let item = self.items.lock().pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    pub fn size(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn is_full(&self) -> bool {
        self.size() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Cumulative dropped items
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            size: self.size(),
            capacity: self.capacity,
            dropped: self.dropped(),
            total_put: self.total_put.load(Ordering::Relaxed),
            overflow_policy: self.policy,
        }
    }
}
