//! In-memory broker transport
//!
//! Stands in for an MQTT session in tests and in the CLI's simulated mode.
//! Cloning shares the same broker, so a test can keep a handle for injecting
//! traffic or dropping the connection while the connector owns another.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use contracts::topic::topic_matches;
use contracts::{BrokerTransport, TransportEvent, TwinError};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

/// Shared in-memory broker
#[derive(Debug, Clone)]
pub struct MockBroker {
    inner: Arc<MockBrokerInner>,
}

#[derive(Debug)]
struct MockBrokerInner {
    name: String,
    connected: AtomicBool,
    failing_connects: AtomicU32,
    failing_subscribes: AtomicU32,
    connect_delay: Mutex<Duration>,
    connect_attempts: AtomicU64,
    active: Mutex<Vec<String>>,
    subscribe_history: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Bytes)>>,
    events_tx: async_channel::Sender<TransportEvent>,
    events_rx: async_channel::Receiver<TransportEvent>,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockBroker {
    pub fn new(name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = async_channel::unbounded();
        Self {
            inner: Arc::new(MockBrokerInner {
                name: name.into(),
                connected: AtomicBool::new(false),
                failing_connects: AtomicU32::new(0),
                failing_subscribes: AtomicU32::new(0),
                connect_delay: Mutex::new(Duration::ZERO),
                connect_attempts: AtomicU64::new(0),
                active: Mutex::new(Vec::new()),
                subscribe_history: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
                events_tx,
                events_rx,
            }),
        }
    }

    /// Make the next `n` connect attempts fail
    pub fn fail_next_connects(&self, n: u32) {
        self.inner.failing_connects.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` subscribe calls fail
    pub fn fail_next_subscribes(&self, n: u32) {
        self.inner.failing_subscribes.store(n, Ordering::SeqCst);
    }

    /// Delay every connect attempt (drives connect timeouts)
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.inner.connect_delay.lock() = delay;
    }

    pub fn connect_attempts(&self) -> u64 {
        self.inner.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Patterns subscribed in the current session
    pub fn active_subscriptions(&self) -> Vec<String> {
        self.inner.active.lock().clone()
    }

    /// Every subscribe call accepted, across sessions
    pub fn subscribe_history(&self) -> Vec<String> {
        self.inner.subscribe_history.lock().clone()
    }

    pub fn published(&self) -> Vec<(String, Bytes)> {
        self.inner.published.lock().clone()
    }

    /// Deliver a raw payload as if another client published it
    ///
    /// Returns false when disconnected or no active subscription matches.
    pub fn inject(&self, topic: &str, payload: impl Into<Bytes>) -> bool {
        if !self.is_connected() || !self.has_subscriber(topic) {
            return false;
        }
        self.inner
            .events_tx
            .try_send(TransportEvent::Message {
                topic: topic.to_string(),
                payload: payload.into(),
            })
            .is_ok()
    }

    pub fn inject_json(&self, topic: &str, payload: &Value) -> bool {
        self.inject(topic, Bytes::from(payload.to_string()))
    }

    /// Simulate the broker dropping the session
    pub fn drop_connection(&self, reason: &str) {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.active.lock().clear();
        debug!(broker = %self.inner.name, reason, "mock broker dropping connection");
        let _ = self.inner.events_tx.try_send(TransportEvent::Disconnected {
            reason: reason.to_string(),
        });
    }

    fn has_subscriber(&self, topic: &str) -> bool {
        self.inner
            .active
            .lock()
            .iter()
            .any(|pattern| topic_matches(pattern, topic))
    }

    fn ensure_connected(&self, op: &str) -> Result<(), TwinError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TwinError::connection(format!("cannot {op}: not connected"))
                .with_detail("transport", &self.inner.name))
        }
    }
}

impl BrokerTransport for MockBroker {
    fn name(&self) -> &str {
        &self.inner.name
    }

    async fn connect(&self) -> Result<(), TwinError> {
        self.inner.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.connect_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TwinError::connection("mock broker refused connection")
                .with_detail("transport", &self.inner.name));
        }

        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(&self, pattern: &str, _qos: u8) -> Result<(), TwinError> {
        self.ensure_connected("subscribe")?;
        let should_fail = self
            .inner
            .failing_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TwinError::connection("mock broker rejected subscription")
                .with_detail("pattern", pattern));
        }
        {
            let mut active = self.inner.active.lock();
            if !active.iter().any(|p| p == pattern) {
                active.push(pattern.to_string());
            }
        }
        self.inner.subscribe_history.lock().push(pattern.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Bytes, _qos: u8) -> Result<(), TwinError> {
        self.ensure_connected("publish")?;
        self.inner
            .published
            .lock()
            .push((topic.to_string(), payload.clone()));
        if self.has_subscriber(topic) {
            let _ = self.inner.events_tx.try_send(TransportEvent::Message {
                topic: topic.to_string(),
                payload,
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TwinError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.active.lock().clear();
        Ok(())
    }

    fn events(&self) -> async_channel::Receiver<TransportEvent> {
        self.inner.events_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_inject_requires_matching_subscription() {
        let broker = MockBroker::default();
        assert!(!broker.inject("sensors/a/temperature", "{}"));

        broker.connect().await.unwrap();
        broker.subscribe("sensors/+/temperature", 1).await.unwrap();

        assert!(broker.inject_json("sensors/a/temperature", &json!({"value": 1})));
        assert!(!broker.inject("sensors/a/vibration", "{}"));

        let event = broker.events().recv().await.unwrap();
        assert!(matches!(event, TransportEvent::Message { ref topic, .. } if topic == "sensors/a/temperature"));
    }

    #[tokio::test]
    async fn test_failing_connects_and_drop() {
        let broker = MockBroker::new("test");
        broker.fail_next_connects(2);
        assert!(broker.connect().await.is_err());
        assert!(broker.connect().await.is_err());
        broker.connect().await.unwrap();
        assert_eq!(broker.connect_attempts(), 3);

        broker.subscribe("a/#", 0).await.unwrap();
        broker.drop_connection("network");
        assert!(!broker.is_connected());
        assert!(broker.active_subscriptions().is_empty());
        assert_eq!(broker.subscribe_history(), vec!["a/#"]);

        let event = broker.events().recv().await.unwrap();
        assert_eq!(
            event,
            TransportEvent::Disconnected {
                reason: "network".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_publish_loops_back() {
        let broker = MockBroker::default();
        assert!(broker.publish("a/b", Bytes::from_static(b"{}"), 1).await.is_err());

        broker.connect().await.unwrap();
        broker.subscribe("a/+", 1).await.unwrap();
        broker.publish("a/b", Bytes::from_static(b"{}"), 1).await.unwrap();

        assert_eq!(broker.published().len(), 1);
        assert!(matches!(
            broker.events().recv().await.unwrap(),
            TransportEvent::Message { .. }
        ));
    }
}
