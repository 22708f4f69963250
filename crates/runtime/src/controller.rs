//! Runtime controller
//!
//! ```text
//! Stopped --start()--> Starting --ok--> Running --stop()--> Draining --> StoppedFinal
//!                         |
//!                         +--error (rolled back)--> Stopped
//! ```
//!
//! Startup order: queue, transform, sinks, connector, health surface, tasks.
//! Teardown order: tasks, transform, sinks, connector, health surface.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use contracts::{
    BrokerTransport, DataSink, InboundMessage, RuntimeState, TransformBlock, TransformContext,
    TwinBlueprint, TwinError, TwinIdentity,
};
use dispatcher::{SinkRegistry, SinkSet};
use ingestion::{BoundedQueue, Connector, ConnectorConfig};
use observability::{HealthServer, RuntimeMetrics};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use transform::{TransformRegistry, TransformSlot};

use crate::health::HealthMonitor;
use crate::stats::{RuntimeStats, SinkStats};
use crate::worker::{run_worker, WorkerContext};

type MessageQueue = BoundedQueue<InboundMessage>;

struct TaskHandle {
    name: String,
    handle: JoinHandle<()>,
}

/// Builder for [`TwinRuntime`]
///
/// Components come from the registries by default; `transform` and `sink`
/// inject instances directly (explicit sinks replace `[[sinks]]`).
pub struct RuntimeBuilder<T> {
    blueprint: TwinBlueprint,
    transport: T,
    transforms: TransformRegistry,
    sink_registry: SinkRegistry,
    transform: Option<Box<dyn TransformBlock>>,
    sinks: Option<Vec<Arc<dyn DataSink>>>,
    metrics: Option<Arc<RuntimeMetrics>>,
}

impl<T: BrokerTransport + Sync + 'static> RuntimeBuilder<T> {
    pub fn transform_registry(mut self, registry: TransformRegistry) -> Self {
        self.transforms = registry;
        self
    }

    pub fn sink_registry(mut self, registry: SinkRegistry) -> Self {
        self.sink_registry = registry;
        self
    }

    pub fn transform(mut self, block: Box<dyn TransformBlock>) -> Self {
        self.transform = Some(block);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn DataSink>) -> Self {
        self.sinks.get_or_insert_with(Vec::new).push(sink);
        self
    }

    pub fn metrics(mut self, metrics: Arc<RuntimeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Resolve the transform and sinks and assemble a stopped runtime
    ///
    /// # Errors
    /// `Configuration` for an unknown model kind, `Sink` for an unknown sink
    /// kind or invalid sink params.
    pub fn build(self) -> Result<TwinRuntime<T>, TwinError> {
        let block = match self.transform {
            Some(block) => block,
            None => self.transforms.create(&self.blueprint.model.kind)?,
        };
        let sinks = match self.sinks {
            Some(sinks) => sinks,
            None => self.sink_registry.build_all(&self.blueprint.sinks)?,
        };
        let metrics = self.metrics.unwrap_or_else(|| Arc::new(RuntimeMetrics::new()));

        let connector = Connector::new(
            self.transport,
            ConnectorConfig::from_broker(&self.blueprint.broker),
            Arc::clone(&metrics),
        );

        Ok(TwinRuntime {
            identity: self.blueprint.identity(),
            blueprint: self.blueprint,
            state: Arc::new(RwLock::new(RuntimeState::Stopped)),
            running: Arc::new(AtomicBool::new(false)),
            transform: Arc::new(TransformSlot::new(block)),
            sinks: Arc::new(SinkSet::with_default(sinks, Arc::clone(&metrics))),
            connector: Arc::new(connector),
            metrics,
            queue: Arc::new(RwLock::new(None)),
            sinks_open: AtomicBool::new(false),
            tasks: Mutex::new(Vec::new()),
            health_server: tokio::sync::Mutex::new(None),
            health_addr: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        })
    }
}

/// One twin: connector, queue, worker pool, transform and sinks
pub struct TwinRuntime<T: BrokerTransport + Sync + 'static> {
    blueprint: TwinBlueprint,
    identity: TwinIdentity,
    state: Arc<RwLock<RuntimeState>>,
    running: Arc<AtomicBool>,
    metrics: Arc<RuntimeMetrics>,
    connector: Arc<Connector<T>>,
    transform: Arc<TransformSlot>,
    sinks: Arc<SinkSet>,
    queue: Arc<RwLock<Option<Arc<MessageQueue>>>>,
    sinks_open: AtomicBool,
    tasks: Mutex<Vec<TaskHandle>>,
    health_server: tokio::sync::Mutex<Option<HealthServer>>,
    health_addr: Mutex<Option<SocketAddr>>,
    /// Serializes start/stop
    lifecycle: tokio::sync::Mutex<()>,
}

impl<T: BrokerTransport + Sync + 'static> TwinRuntime<T> {
    pub fn builder(blueprint: TwinBlueprint, transport: T) -> RuntimeBuilder<T> {
        RuntimeBuilder {
            blueprint,
            transport,
            transforms: TransformRegistry::with_builtins(),
            sink_registry: SinkRegistry::with_builtins(),
            transform: None,
            sinks: None,
            metrics: None,
        }
    }

    /// Runtime with the built-in transforms and sinks
    pub fn from_blueprint(blueprint: TwinBlueprint, transport: T) -> Result<Self, TwinError> {
        Self::builder(blueprint, transport).build()
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    pub fn identity(&self) -> &TwinIdentity {
        &self.identity
    }

    pub fn blueprint(&self) -> &TwinBlueprint {
        &self.blueprint
    }

    pub fn metrics(&self) -> Arc<RuntimeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn connector(&self) -> &Arc<Connector<T>> {
        &self.connector
    }

    /// Bound health server address, while it is serving
    pub fn health_addr(&self) -> Option<SocketAddr> {
        *self.health_addr.lock()
    }

    fn set_state(&self, state: RuntimeState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        debug!(from = %previous, to = %state, "Runtime state changed");
    }

    /// Start every component and the worker pool
    ///
    /// # Errors
    /// - `Configuration` when not in `Stopped`, or for an invalid queue setup
    /// - whatever the failing startup step returns; the runtime is rolled
    ///   back to `Stopped` first
    #[instrument(
        name = "runtime_start",
        skip(self),
        fields(twin_id = %self.identity.twin_id, asset_id = %self.identity.asset_id)
    )]
    pub async fn start(&self) -> Result<(), TwinError> {
        let _lifecycle = self.lifecycle.lock().await;
        {
            let mut state = self.state.write();
            if *state != RuntimeState::Stopped {
                return Err(TwinError::configuration(format!(
                    "cannot start runtime in state '{}'",
                    *state
                ))
                .with_detail("state", *state));
            }
            *state = RuntimeState::Starting;
        }
        info!("Starting runtime");

        match self.start_components().await {
            Ok(()) => {
                self.set_state(RuntimeState::Running);
                info!(
                    workers = self.blueprint.runtime.workers,
                    sinks = ?self.sinks.names(),
                    topics = ?self.blueprint.broker.topics,
                    "Runtime running"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Startup failed, rolling back");
                self.teardown().await;
                self.set_state(RuntimeState::Stopped);
                Err(e)
            }
        }
    }

    async fn start_components(&self) -> Result<(), TwinError> {
        let settings = &self.blueprint.runtime;

        let queue = Arc::new(MessageQueue::new(
            settings.queue_size,
            settings.queue_overflow_policy,
        )?);
        *self.queue.write() = Some(Arc::clone(&queue));

        let context = TransformContext::new(self.identity.clone(), self.blueprint.model.params.clone());
        self.transform.initialize(&context)?;

        self.sinks.open_all().await?;
        self.sinks_open.store(true, Ordering::SeqCst);

        if self.blueprint.broker.topics.is_empty() {
            warn!("No topics configured, runtime will not receive messages");
        }
        let (route_tx, route_rx) = async_channel::bounded(settings.queue_size);
        for topic in &self.blueprint.broker.topics {
            self.connector.subscribe(topic, route_tx.clone()).await?;
        }
        drop(route_tx);
        self.connector.connect().await?;

        self.running.store(true, Ordering::SeqCst);
        self.start_health_server().await;

        let mut tasks = Vec::with_capacity(settings.workers + 1);
        tasks.push(TaskHandle {
            name: "ingest".to_string(),
            handle: tokio::spawn(ingest_loop(
                route_rx,
                Arc::clone(&queue),
                Arc::clone(&self.metrics),
                Arc::clone(&self.running),
                settings.enqueue_timeout(),
                settings.poll_interval(),
            )),
        });

        let ctx = WorkerContext {
            queue,
            transform: Arc::clone(&self.transform),
            sinks: Arc::clone(&self.sinks),
            identity: self.identity.clone(),
            metrics: Arc::clone(&self.metrics),
            running: Arc::clone(&self.running),
            poll_interval: settings.poll_interval(),
        };
        for worker_id in 0..settings.workers {
            tasks.push(TaskHandle {
                name: format!("worker-{worker_id}"),
                handle: tokio::spawn(run_worker(worker_id, ctx.clone())),
            });
        }
        *self.tasks.lock() = tasks;
        Ok(())
    }

    async fn start_health_server(&self) {
        let health = &self.blueprint.health;
        if !health.enabled {
            debug!("Health server disabled");
            return;
        }

        match HealthServer::start(&health.host, health.port, Arc::new(self.health_monitor())).await {
            Ok(server) => {
                *self.health_addr.lock() = Some(server.local_addr());
                *self.health_server.lock().await = Some(server);
            }
            Err(e) => warn!(error = %e, "Health server unavailable, continuing without it"),
        }
    }

    /// Drain and stop; a no-op unless `Running`
    #[instrument(name = "runtime_stop", skip(self), fields(twin_id = %self.identity.twin_id))]
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        {
            let mut state = self.state.write();
            let current = *state;
            if current != RuntimeState::Running {
                debug!(state = %current, "Runtime not running, stop ignored");
                return;
            }
            *state = RuntimeState::Draining;
        }
        info!("Stopping runtime");

        self.teardown().await;
        self.set_state(RuntimeState::StoppedFinal);

        let snapshot = self.metrics.snapshot();
        info!(
            received = snapshot.messages_received,
            processed = snapshot.messages_processed,
            dropped = snapshot.messages_dropped,
            processing_errors = snapshot.processing_errors,
            sink_write_errors = snapshot.sink_write_errors,
            "Runtime stopped"
        );
    }

    /// Start, wait for `shutdown`, then stop
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), TwinError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        info!("Shutdown requested");
        self.stop().await;
        Ok(())
    }

    /// Release everything a (possibly partial) start acquired
    ///
    /// Each step runs regardless of the previous ones.
    async fn teardown(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.join_tasks().await;

        self.transform.shutdown();

        if self.sinks_open.swap(false, Ordering::SeqCst) {
            self.sinks.shutdown().await;
        }

        self.connector.disconnect().await;

        let server = self.health_server.lock().await.take();
        if let Some(mut server) = server {
            server.stop().await;
        }
        *self.health_addr.lock() = None;

        if let Some(queue) = self.queue.read().as_ref() {
            if !queue.is_empty() {
                warn!(remaining = queue.size(), "Messages left in queue were not processed");
            }
        }
    }

    async fn join_tasks(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        let join_timeout = self.blueprint.runtime.join_timeout();

        for TaskHandle { name, mut handle } in tasks {
            match tokio::time::timeout(join_timeout, &mut handle).await {
                Ok(Ok(())) => debug!(task = %name, "Task joined"),
                Ok(Err(e)) if e.is_panic() => error!(task = %name, error = %e, "Task panicked"),
                Ok(Err(e)) => debug!(task = %name, error = %e, "Task cancelled"),
                Err(_) => {
                    warn!(
                        task = %name,
                        timeout_ms = join_timeout.as_millis() as u64,
                        "Task did not exit in time, aborting"
                    );
                    handle.abort();
                }
            }
        }
    }

    /// Probe over this runtime's live state
    pub fn health_monitor(&self) -> HealthMonitor {
        let connector = Arc::clone(&self.connector);
        let transform = Arc::clone(&self.transform);
        let sinks = Arc::clone(&self.sinks);
        let metrics = Arc::clone(&self.metrics);
        let queue = Arc::clone(&self.queue);

        HealthMonitor::new(Arc::clone(&self.state))
            .with_connection(move || connector.is_connected())
            .with_transform(move || transform.is_initialized())
            .with_sinks(move || !sinks.is_empty())
            .with_report(move || metrics_report(&metrics, queue.read().as_deref()))
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            twin_id: self.identity.twin_id.clone(),
            asset_id: self.identity.asset_id.clone(),
            state: self.state(),
            workers: self.blueprint.runtime.workers,
            sinks: self
                .sinks
                .metrics()
                .into_iter()
                .map(|(name, counters)| SinkStats { name, counters })
                .collect(),
            queue: self.queue.read().as_ref().map(|q| q.stats()),
            metrics: self.metrics.snapshot(),
            connector: self.connector.health_check(),
            transform: self.transform.debug_state(),
        }
    }
}

impl<T: BrokerTransport + Sync + 'static> Drop for TwinRuntime<T> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for task in self.tasks.get_mut().drain(..) {
            task.handle.abort();
        }
    }
}

/// Body served on `/metrics`
fn metrics_report(metrics: &RuntimeMetrics, queue: Option<&MessageQueue>) -> Value {
    let mut report = serde_json::to_value(metrics.snapshot()).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut report {
        map.insert(
            "queue".into(),
            queue.map(|q| json!(q.stats())).unwrap_or(Value::Null),
        );
    }
    report
}

/// Move routed messages from the connector into the bounded queue
///
/// Overflow is counted here so the connector's event loop never sees it.
async fn ingest_loop(
    routes: Receiver<InboundMessage>,
    queue: Arc<MessageQueue>,
    metrics: Arc<RuntimeMetrics>,
    running: Arc<AtomicBool>,
    enqueue_timeout: Duration,
    poll_interval: Duration,
) {
    debug!("Ingest task started");
    while running.load(Ordering::SeqCst) {
        let message = match tokio::time::timeout(poll_interval, routes.recv()).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => {
                debug!("Route channel closed");
                break;
            }
            Err(_) => continue,
        };

        metrics.record_received();
        let topic = message.topic.clone();
        let dropped_before = queue.dropped();

        match queue.put(message, Some(enqueue_timeout)).await {
            Ok(accepted) => {
                let dropped = queue.dropped() - dropped_before;
                metrics.record_dropped(dropped);
                if !accepted {
                    debug!(topic = %topic, "Queue full, newest message dropped");
                } else if dropped > 0 {
                    debug!(topic = %topic, dropped, "Queue full, oldest message dropped");
                }
            }
            Err(e) => {
                metrics.record_dropped(1);
                warn!(topic = %topic, error = %e, "Enqueue timed out, message dropped");
            }
        }
        metrics.record_queue_depth(queue.size());
    }
    debug!("Ingest task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ErrorKind, HealthSection, ModelSection, RuntimeSection, SinkSpec};
    use dispatcher::MemorySink;
    use ingestion::MockBroker;
    use observability::HealthProbe;

    const TOPIC: &str = "sensors/asset-1/temperature";

    fn blueprint() -> TwinBlueprint {
        let mut runtime = RuntimeSection::new("twin-1", "asset-1");
        runtime.worker_poll_interval_ms = 10;
        runtime.worker_join_timeout_ms = 500;
        let mut model = ModelSection::new("scale");
        model.params.insert("factor".into(), json!(0.5));

        TwinBlueprint {
            runtime,
            broker: contracts::BrokerSection {
                topics: vec!["sensors/+/temperature".into()],
                connect_timeout_ms: 200,
                ..Default::default()
            },
            model,
            sinks: Vec::new(),
            health: HealthSection::disabled(),
        }
    }

    fn runtime_with(broker: &MockBroker, sink: &MemorySink) -> TwinRuntime<MockBroker> {
        TwinRuntime::builder(blueprint(), broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap()
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn test_start_process_stop() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let runtime = runtime_with(&broker, &sink);

        runtime.start().await.unwrap();
        assert_eq!(runtime.state(), RuntimeState::Running);
        assert!(sink.is_open());

        assert!(broker.inject_json(TOPIC, &json!({"value": 10})));
        wait_for(|| sink.len() == 1).await;
        let record = &sink.records()[0];
        assert_eq!(record.twin_estimate, 5.0);
        assert_eq!(record.residual, Some(5.0));

        runtime.stop().await;
        assert_eq!(runtime.state(), RuntimeState::StoppedFinal);
        assert!(!sink.is_open());
        assert_eq!(sink.flush_count(), 1);
        assert!(!broker.is_connected());
        assert_eq!(runtime.metrics().messages_received(), 1);
        assert_eq!(runtime.metrics().messages_processed(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let runtime = runtime_with(&broker, &sink);

        runtime.stop().await;
        assert_eq!(runtime.state(), RuntimeState::Stopped);

        runtime.start().await.unwrap();
        runtime.stop().await;
        runtime.stop().await;
        assert_eq!(runtime.state(), RuntimeState::StoppedFinal);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_configuration_error() {
        let broker = MockBroker::default();
        let runtime = runtime_with(&broker, &MemorySink::new("mem"));
        runtime.start().await.unwrap();

        let err = runtime.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.detail("state").as_deref(), Some("running"));

        runtime.stop().await;
        assert!(runtime.start().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_connect_rolls_back() {
        let broker = MockBroker::default();
        broker.fail_next_connects(1);
        let sink = MemorySink::new("mem");
        let runtime = runtime_with(&broker, &sink);

        let err = runtime.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert!(!sink.is_open());
        assert_eq!(sink.close_count(), 1);
        assert!(!runtime.health_monitor().readiness());

        // a later attempt can still succeed
        runtime.start().await.unwrap();
        assert!(runtime.is_running());
        runtime.stop().await;
    }

    #[tokio::test]
    async fn test_failed_sink_open_rolls_back_transform() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        sink.fail_open(true);
        let runtime = runtime_with(&broker, &sink);

        let err = runtime.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Sink);
        assert_eq!(runtime.state(), RuntimeState::Stopped);
        assert_eq!(broker.connect_attempts(), 0);
        assert_eq!(runtime.health_monitor().checks()["transform_initialized"], false);
    }

    #[tokio::test]
    async fn test_unknown_kinds_fail_build() {
        let mut bp = blueprint();
        bp.model.kind = "neural".into();
        let err = TwinRuntime::from_blueprint(bp, MockBroker::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let mut bp = blueprint();
        bp.sinks.push(SinkSpec::new("out", "kafka"));
        let err = TwinRuntime::from_blueprint(bp, MockBroker::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Sink);
    }

    #[tokio::test]
    async fn test_default_sink_installed() {
        let runtime = TwinRuntime::from_blueprint(blueprint(), MockBroker::default()).unwrap();
        let stats = runtime.stats();
        assert_eq!(stats.sinks.len(), 1);
        assert_eq!(stats.sinks[0].name, "stdout");
        assert!(stats.queue.is_none());
    }

    #[tokio::test]
    async fn test_readiness_tracks_connection() {
        let broker = MockBroker::default();
        let runtime = runtime_with(&broker, &MemorySink::new("mem"));
        let monitor = runtime.health_monitor();
        assert!(!monitor.liveness());
        assert!(!monitor.readiness());

        runtime.start().await.unwrap();
        assert!(monitor.liveness());
        assert!(monitor.readiness());

        broker.set_connect_delay(Duration::from_secs(5));
        broker.drop_connection("network down");
        wait_for(|| !runtime.connector().is_connected()).await;
        assert!(monitor.liveness());
        assert!(!monitor.readiness());

        runtime.stop().await;
        assert!(!monitor.liveness());
    }

    #[tokio::test]
    async fn test_block_policy_counts_dropped() {
        let mut bp = blueprint();
        bp.runtime.queue_size = 1;
        bp.runtime.enqueue_timeout_ms = 20;
        bp.runtime.queue_overflow_policy = contracts::OverflowPolicy::Block;
        bp.runtime.workers = 1;

        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        sink.set_write_delay(Duration::from_millis(200));
        let runtime = TwinRuntime::builder(bp, broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        runtime.start().await.unwrap();

        for i in 0..5 {
            broker.inject_json(TOPIC, &json!({ "value": i }));
        }
        let metrics = runtime.metrics();
        wait_for(|| metrics.messages_received() == 5).await;
        assert!(metrics.messages_dropped() >= 1);

        runtime.stop().await;
    }

    #[tokio::test]
    async fn test_stop_aborts_workers_past_join_timeout() {
        let mut bp = blueprint();
        bp.runtime.workers = 2;
        bp.runtime.worker_join_timeout_ms = 200;

        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        sink.set_write_delay(Duration::from_secs(3));
        let runtime = TwinRuntime::builder(bp, broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        runtime.start().await.unwrap();

        broker.inject_json(TOPIC, &json!({"value": 1}));
        broker.inject_json(TOPIC, &json!({"value": 2}));
        let metrics = runtime.metrics();
        wait_for(|| metrics.messages_received() == 2).await;
        // both workers are now parked inside the slow write
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = tokio::time::Instant::now();
        runtime.stop().await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(200), "stop took {elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "stop took {elapsed:?}");
        assert_eq!(runtime.state(), RuntimeState::StoppedFinal);
        assert_eq!(sink.len(), 0);
        assert!(!sink.is_open());
        assert_eq!(sink.close_count(), 1);
        assert_eq!(metrics.messages_processed(), 0);
    }

    #[tokio::test]
    async fn test_stats_and_metrics_report() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let runtime = runtime_with(&broker, &sink);
        runtime.start().await.unwrap();

        broker.inject_json(TOPIC, &json!({"value": 4}));
        wait_for(|| sink.len() == 1).await;

        let stats = runtime.stats();
        assert_eq!(stats.twin_id, "twin-1");
        assert_eq!(stats.state, RuntimeState::Running);
        assert_eq!(stats.sinks[0].counters.write_count, 1);
        assert_eq!(stats.queue.unwrap().capacity, 1000);
        assert_eq!(stats.connector["connected"], true);

        let report = runtime.health_monitor().metrics();
        assert_eq!(report["messages_processed"], 1);
        assert_eq!(report["queue"]["capacity"], 1000);
        assert_eq!(report["state"], "running");

        runtime.stop().await;
    }
}
