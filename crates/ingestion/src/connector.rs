//! Broker connector
//!
//! Owns one session through a [`BrokerTransport`], keeps the route table and
//! re-establishes the session with exponential backoff when the transport
//! reports a drop.
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Backoff(delay) -> Connecting -> ...
//!                                   |
//!                                   +-- disconnect() --> Disconnected
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use bytes::Bytes;
use contracts::topic::validate_pattern;
use contracts::{BrokerSection, BrokerTransport, ConnectorState, InboundMessage, TransportEvent, TwinError};
use observability::RuntimeMetrics;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::backoff::Backoff;
use crate::routes::RouteTable;

/// Connector settings
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub host: String,
    pub port: u16,
    pub qos: u8,
    pub connect_timeout: Duration,
    pub reconnect_delay_min: Duration,
    pub reconnect_delay_max: Duration,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::from_broker(&BrokerSection::default())
    }
}

impl ConnectorConfig {
    pub fn from_broker(broker: &BrokerSection) -> Self {
        Self {
            host: broker.host.clone(),
            port: broker.port,
            qos: broker.qos,
            connect_timeout: broker.connect_timeout(),
            reconnect_delay_min: broker.reconnect_delay_min(),
            reconnect_delay_max: broker.reconnect_delay_max(),
        }
    }
}

/// Route channel end handed to `subscribe`
pub type Route = Sender<InboundMessage>;

/// Broker connector
pub struct Connector<T: BrokerTransport + Sync + 'static> {
    inner: Arc<ConnectorInner<T>>,
    event_task: Mutex<Option<JoinHandle<()>>>,
}

struct ConnectorInner<T> {
    transport: T,
    config: ConnectorConfig,
    state: RwLock<ConnectorState>,
    routes: RwLock<RouteTable<Route>>,
    running: AtomicBool,
    backoff: Mutex<Backoff>,
    reconnect_attempts: AtomicU64,
    routed: AtomicU64,
    unroutable: AtomicU64,
    parse_errors: AtomicU64,
    metrics: Arc<RuntimeMetrics>,
}

impl<T: BrokerTransport + Sync + 'static> Connector<T> {
    pub fn new(transport: T, config: ConnectorConfig, metrics: Arc<RuntimeMetrics>) -> Self {
        let backoff = Backoff::new(config.reconnect_delay_min, config.reconnect_delay_max);
        Self {
            inner: Arc::new(ConnectorInner {
                transport,
                config,
                state: RwLock::new(ConnectorState::Disconnected),
                routes: RwLock::new(RouteTable::new()),
                running: AtomicBool::new(false),
                backoff: Mutex::new(backoff),
                reconnect_attempts: AtomicU64::new(0),
                routed: AtomicU64::new(0),
                unroutable: AtomicU64::new(0),
                parse_errors: AtomicU64::new(0),
                metrics,
            }),
            event_task: Mutex::new(None),
        }
    }

    /// Open the session, replay subscriptions and start the event loop
    ///
    /// # Errors
    /// `Connection` when the transport fails or does not answer within
    /// `connect_timeout`
    #[instrument(
        name = "connector_connect",
        skip(self),
        fields(transport = %self.inner.transport.name(), host = %self.inner.config.host, port = self.inner.config.port)
    )]
    pub async fn connect(&self) -> Result<(), TwinError> {
        if self.is_connected() {
            debug!("already connected");
            return Ok(());
        }

        let inner = &self.inner;
        inner.running.store(true, Ordering::SeqCst);
        inner.set_state(ConnectorState::Connecting);

        if let Err(e) = inner.connect_once().await {
            inner.running.store(false, Ordering::SeqCst);
            inner.set_state(ConnectorState::Disconnected);
            inner.metrics.record_connection_error();
            return Err(e);
        }

        inner.set_state(ConnectorState::Connected);
        inner.backoff.lock().reset();
        info!("connected");

        if let Err(e) = inner.resubscribe().await {
            self.disconnect().await;
            return Err(e);
        }

        self.spawn_event_loop();
        Ok(())
    }

    /// Register a route for `pattern`
    ///
    /// Replaces the route of an already registered pattern. Subscribes at the
    /// broker right away when connected.
    #[instrument(name = "connector_subscribe", skip(self, route))]
    pub async fn subscribe(&self, pattern: &str, route: Route) -> Result<(), TwinError> {
        validate_pattern(pattern)?;

        let replaced = {
            let mut routes = self.inner.routes.write();
            let overlapping: Vec<String> =
                routes.overlapping(pattern).into_iter().map(String::from).collect();
            if !overlapping.is_empty() {
                warn!(
                    pattern,
                    overlapping = ?overlapping,
                    "topic pattern overlaps existing subscriptions, first registered wins"
                );
            }
            routes.insert(pattern, route)
        };
        debug!(pattern, replaced, "route registered");

        if self.is_connected() {
            if let Err(e) = self
                .inner
                .transport
                .subscribe(pattern, self.inner.config.qos)
                .await
            {
                // a replaced pattern was accepted earlier and is kept
                if !replaced {
                    self.inner.routes.write().remove(pattern);
                }
                warn!(pattern, error = %e, "broker rejected subscription");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Publish a JSON payload
    ///
    /// Returns false (and logs) when not connected or the transport rejects it.
    pub async fn publish(&self, topic: &str, payload: &Value) -> bool {
        if !self.is_connected() {
            warn!(topic, "publish while disconnected, message discarded");
            return false;
        }
        let bytes = Bytes::from(payload.to_string());
        match self
            .inner
            .transport
            .publish(topic, bytes, self.inner.config.qos)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(topic, error = %e, "publish failed");
                false
            }
        }
    }

    /// Close the session and stop reconnecting; idempotent
    #[instrument(name = "connector_disconnect", skip(self))]
    pub async fn disconnect(&self) {
        let was_running = self.inner.running.swap(false, Ordering::SeqCst);
        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }

        if self.inner.state() != ConnectorState::Disconnected {
            if let Err(e) = self.inner.transport.disconnect().await {
                warn!(error = %e, "transport disconnect failed");
            }
            self.inner.set_state(ConnectorState::Disconnected);
        }

        if was_running {
            info!("disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state().is_connected()
    }

    pub fn state(&self) -> ConnectorState {
        self.inner.state()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.inner.routes.read().patterns().map(String::from).collect()
    }

    pub fn reconnect_attempts(&self) -> u64 {
        self.inner.reconnect_attempts.load(Ordering::Relaxed)
    }

    pub fn health_check(&self) -> Value {
        let inner = &self.inner;
        json!({
            "type": inner.transport.name(),
            "state": inner.state().to_string(),
            "connected": self.is_connected(),
            "host": inner.config.host,
            "port": inner.config.port,
            "subscriptions": self.subscriptions(),
            "reconnect_attempts": self.reconnect_attempts(),
            "messages_routed": inner.routed.load(Ordering::Relaxed),
            "unroutable": inner.unroutable.load(Ordering::Relaxed),
            "parse_errors": inner.parse_errors.load(Ordering::Relaxed),
        })
    }

    fn spawn_event_loop(&self) {
        let mut slot = self.event_task.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        let events = inner.transport.events();
        *slot = Some(tokio::spawn(event_loop(inner, events)));
    }
}

impl<T: BrokerTransport + Sync + 'static> Drop for Connector<T> {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

impl<T: BrokerTransport + Sync + 'static> ConnectorInner<T> {
    fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    fn set_state(&self, state: ConnectorState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!(from = %previous, to = %state, "connector state changed");
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn connect_once(&self) -> Result<(), TwinError> {
        let timeout = self.config.connect_timeout;
        let with_endpoint = |e: TwinError| {
            e.with_detail("host", &self.config.host)
                .with_detail("port", self.config.port)
                .with_detail("timeout_ms", timeout.as_millis())
        };

        match tokio::time::timeout(timeout, self.transport.connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(with_endpoint(TwinError::connection(format!(
                "failed to connect to {}:{}: {e}",
                self.config.host, self.config.port
            )))),
            Err(_) => Err(with_endpoint(TwinError::connection(format!(
                "connection to {}:{} timed out after {}ms",
                self.config.host,
                self.config.port,
                timeout.as_millis()
            )))),
        }
    }

    async fn resubscribe(&self) -> Result<(), TwinError> {
        let patterns: Vec<String> = self.routes.read().patterns().map(String::from).collect();
        for pattern in &patterns {
            self.transport.subscribe(pattern, self.config.qos).await?;
        }
        if !patterns.is_empty() {
            debug!(count = patterns.len(), "subscriptions restored");
        }
        Ok(())
    }

    async fn dispatch(&self, topic: &str, payload: &[u8]) {
        let route = self.routes.read().resolve(topic).cloned();
        let Some(route) = route else {
            self.unroutable.fetch_add(1, Ordering::Relaxed);
            warn!(topic, "no route for topic");
            return;
        };

        let payload = match serde_json::from_slice::<Value>(payload) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                self.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!(topic, kind = json_kind(&other), "payload is not a JSON object");
                return;
            }
            Err(e) => {
                self.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!(topic, error = %e, "payload is not valid JSON");
                return;
            }
        };

        self.routed.fetch_add(1, Ordering::Relaxed);
        if route.send(InboundMessage::new(topic, payload)).await.is_err() {
            debug!(topic, "route channel closed, message discarded");
        }
    }

    /// Retry until connected or stopped
    async fn reconnect_with_backoff(&self) {
        while self.is_running() {
            let delay = self.backoff.lock().next_delay();
            self.set_state(ConnectorState::Backoff(delay));
            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
            info!(delay_ms = delay.as_millis() as u64, attempt, "reconnecting after backoff");

            tokio::time::sleep(delay).await;
            if !self.is_running() {
                break;
            }

            self.set_state(ConnectorState::Connecting);
            match self.connect_once().await {
                Ok(()) => {
                    self.set_state(ConnectorState::Connected);
                    self.backoff.lock().reset();
                    info!(attempt, "reconnected");
                    if let Err(e) = self.resubscribe().await {
                        warn!(error = %e, "failed to restore subscriptions after reconnect");
                    }
                    return;
                }
                Err(e) => {
                    self.metrics.record_connection_error();
                    warn!(error = %e, attempt, "reconnect failed");
                }
            }
        }
        self.set_state(ConnectorState::Disconnected);
    }
}

async fn event_loop<T: BrokerTransport + Sync + 'static>(
    inner: Arc<ConnectorInner<T>>,
    events: Receiver<TransportEvent>,
) {
    while let Ok(event) = events.recv().await {
        match event {
            TransportEvent::Message { topic, payload } => inner.dispatch(&topic, &payload).await,
            TransportEvent::Disconnected { reason } => {
                if !inner.is_running() {
                    break;
                }
                warn!(reason = %reason, "transport disconnected");
                inner.metrics.record_connection_error();
                inner.set_state(ConnectorState::Disconnected);
                inner.reconnect_with_backoff().await;
            }
        }
    }
    debug!("connector event loop finished");
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
