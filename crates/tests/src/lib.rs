//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Responsibilities:
//! - Configuration to runtime wiring
//! - Mock broker e2e runs (no real broker needed)
//! - Health surface over real HTTP

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::topic::topic_matches;
    use contracts::{ErrorKind, OverflowPolicy};

    #[test]
    fn test_wildcard_matching() {
        assert!(topic_matches("sensors/+/temperature", "sensors/motor-001/temperature"));
        assert!(!topic_matches(
            "sensors/+/temperature",
            "sensors/motor-001/vibration/extra"
        ));
        assert!(topic_matches("sensors/#", "sensors/motor-001/temperature"));
        assert!(topic_matches("sensors/#", "sensors/motor-001/vibration/extra"));
    }

    #[test]
    fn test_blueprint_round_trip_through_loader() {
        let toml = r#"
[runtime]
twin_id = "motor-twin"
asset_id = "${ASSET:-motor-001}"
queue_overflow_policy = "block"

[broker]
topics = ["sensors/+/temperature"]

[model]
kind = "kalman"
params = { process_noise = 0.001 }
"#;
        let blueprint = ConfigLoader::load_with_env(toml, ConfigFormat::Toml, &|_| None).unwrap();
        assert_eq!(blueprint.runtime.asset_id, "motor-001");
        assert_eq!(blueprint.runtime.queue_overflow_policy, OverflowPolicy::Block);

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let again = ConfigLoader::load_with_env(&json, ConfigFormat::Json, &|_| None).unwrap();
        assert_eq!(again.identity(), blueprint.identity());
        assert_eq!(again.model.params, blueprint.model.params);
    }

    #[test]
    fn test_bad_overflow_policy_is_configuration_error() {
        let toml = r#"
[runtime]
twin_id = "t"
asset_id = "a"
queue_overflow_policy = "spill"

[broker]
topics = ["x"]

[model]
kind = "passthrough"
"#;
        let err = ConfigLoader::load_with_env(toml, ConfigFormat::Toml, &|_| None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        IngressEnvelope, ModelOutput, RuntimeState, TransformBlock, TransformContext, TwinBlueprint,
        TwinError,
    };
    use dispatcher::MemorySink;
    use ingestion::MockBroker;
    use observability::HealthProbe;
    use runtime::TwinRuntime;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    const TOPIC: &str = "sensors/motor-001/temperature";

    fn blueprint(model: &str, extra: &str) -> TwinBlueprint {
        let toml = format!(
            r#"
[runtime]
twin_id = "motor-twin"
asset_id = "motor-001"
workers = 1
worker_poll_interval_ms = 10
worker_join_timeout_ms = 1000

[broker]
topics = ["sensors/+/temperature"]
reconnect_delay_min_ms = 10
reconnect_delay_max_ms = 40
connect_timeout_ms = 500

[health]
enabled = false

{model}

{extra}
"#
        );
        ConfigLoader::load_with_env(&toml, ConfigFormat::Toml, &|_| None).unwrap()
    }

    fn scale_model() -> &'static str {
        "[model]\nkind = \"scale\"\nparams = { factor = 0.5 }"
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        for _ in 0..300 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    /// Fails on every negative reading
    struct RejectNegative;

    impl TransformBlock for RejectNegative {
        fn name(&self) -> &str {
            "reject_negative"
        }

        fn initialize(&mut self, _context: &TransformContext) -> Result<(), TwinError> {
            Ok(())
        }

        fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError> {
            if envelope.value < 0.0 {
                return Err(TwinError::transform("negative reading"));
            }
            Ok(ModelOutput::new(envelope.value, envelope.value, false))
        }
    }

    /// MockBroker -> Connector -> Queue -> Worker -> ScaleBlock -> MemorySink
    #[tokio::test]
    async fn test_e2e_scale_by_half() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();

        twin.start().await.unwrap();
        assert!(broker.inject_json(TOPIC, &json!({"value": 10})));
        wait_for(|| sink.len() == 1).await;
        twin.stop().await;

        let record = &sink.records()[0];
        assert_eq!(record.twin_estimate, 5.0);
        assert_eq!(record.residual, Some(5.0));
        assert_eq!(record.raw_value, 10.0);
        assert_eq!(record.asset_id, "motor-001");
        assert_eq!(record.twin_id, "motor-twin");
    }

    #[tokio::test]
    async fn test_failing_transform_keeps_processing() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .transform(Box::new(RejectNegative))
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        twin.start().await.unwrap();

        for value in [1.0, -1.0, 2.0, -2.0, -3.0, 4.0] {
            broker.inject_json(TOPIC, &json!({ "value": value }));
        }
        let metrics = twin.metrics();
        wait_for(|| metrics.messages_processed() + metrics.processing_errors() == 6).await;
        twin.stop().await;

        assert_eq!(metrics.processing_errors(), 3);
        assert_eq!(metrics.messages_processed(), 3);
        let values: Vec<f64> = sink.records().iter().map(|r| r.raw_value).collect();
        assert_eq!(values, vec![1.0, 2.0, 4.0]);
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_starve_working_sink() {
        let broker = MockBroker::default();
        let broken = MemorySink::new("broken");
        broken.fail_writes(true);
        let working = MemorySink::new("working");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .sink(Arc::new(broken.clone()))
            .sink(Arc::new(working.clone()))
            .build()
            .unwrap();
        twin.start().await.unwrap();

        for value in 0..3 {
            broker.inject_json(TOPIC, &json!({ "value": value }));
        }
        wait_for(|| working.len() == 3).await;
        twin.stop().await;

        let stats = twin.stats();
        assert_eq!(stats.metrics.sink_write_errors, 3);
        assert_eq!(stats.metrics.messages_processed, 3);
        assert_eq!(stats.sinks[0].counters.failure_count, 3);
        assert_eq!(stats.sinks[1].counters.write_count, 3);
        assert_eq!(broken.close_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_twice_same_state() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        twin.start().await.unwrap();
        broker.inject_json(TOPIC, &json!({"value": 1}));
        wait_for(|| sink.len() == 1).await;

        twin.stop().await;
        let first = serde_json::to_value(twin.stats()).unwrap();
        twin.stop().await;
        let second = serde_json::to_value(twin.stats()).unwrap();

        assert_eq!(twin.state(), RuntimeState::StoppedFinal);
        assert_eq!(first["state"], second["state"]);
        assert_eq!(first["sinks"], second["sinks"]);
        assert_eq!(first["metrics"]["messages_processed"], second["metrics"]["messages_processed"]);
        assert_eq!(sink.close_count(), 1);
    }

    #[tokio::test]
    async fn test_resubscribes_and_resumes_after_drop() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        twin.start().await.unwrap();
        let monitor = twin.health_monitor();
        assert!(monitor.readiness());

        broker.fail_next_connects(2);
        broker.drop_connection("link lost");
        let connector = Arc::clone(twin.connector());
        wait_for(|| connector.reconnect_attempts() == 3 && connector.is_connected()).await;

        assert_eq!(broker.active_subscriptions(), vec!["sensors/+/temperature".to_string()]);
        assert!(monitor.readiness());
        assert_eq!(twin.metrics().connection_errors(), 3);

        broker.inject_json(TOPIC, &json!({"value": 8}));
        wait_for(|| sink.len() == 1).await;
        assert_eq!(sink.records()[0].twin_estimate, 4.0);

        twin.stop().await;
    }

    #[tokio::test]
    async fn test_kalman_to_csv() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("twin.csv");
        let sinks = format!(
            "[[sinks]]\nname = \"csv\"\nkind = \"csv\"\nparams = {{ path = \"{}\", columns = \"raw_value,twin_estimate,anomaly_flag\" }}",
            path.display()
        );
        let model = "[model]\nkind = \"kalman\"\nparams = { initial_estimate = 70.0, measurement_noise = 0.5 }";

        let broker = MockBroker::default();
        let twin = TwinRuntime::from_blueprint(blueprint(model, &sinks), broker.clone()).unwrap();
        twin.start().await.unwrap();

        for value in [70.0, 70.2, 69.9, 70.1] {
            broker.inject_json(TOPIC, &json!({ "value": value }));
        }
        let metrics = twin.metrics();
        wait_for(|| metrics.messages_processed() == 4).await;
        twin.stop().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "raw_value,twin_estimate,anomaly_flag");
        assert_eq!(lines.len(), 5);
        assert!(lines[1..].iter().all(|l| l.ends_with(",false")));

        let state = twin.stats().transform.unwrap();
        assert_eq!(state["message_count"], 4);
    }

    #[tokio::test]
    async fn test_unroutable_and_bad_payloads_are_counted() {
        let broker = MockBroker::default();
        let sink = MemorySink::new("mem");
        let twin = TwinRuntime::builder(blueprint(scale_model(), ""), broker.clone())
            .sink(Arc::new(sink.clone()))
            .build()
            .unwrap();
        twin.start().await.unwrap();

        broker.inject(TOPIC, "not json");
        broker.inject(TOPIC, "[1, 2]");
        broker.inject_json(TOPIC, &json!({"value": 2}));
        wait_for(|| sink.len() == 1).await;

        let health = twin.connector().health_check();
        assert_eq!(health["parse_errors"], 2);
        assert_eq!(twin.metrics().messages_received(), 1);
        twin.stop().await;
    }

    async fn http_get(addr: std::net::SocketAddr, path: &str) -> (u16, serde_json::Value) {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        let status = response[9..12].parse().unwrap();
        let body = response.split("\r\n\r\n").nth(1).unwrap_or_default();
        (status, serde_json::from_str(body).unwrap_or(serde_json::Value::Null))
    }

    #[tokio::test]
    async fn test_health_endpoints_over_http() {
        let mut bp = blueprint(scale_model(), "");
        bp.health.enabled = true;
        bp.health.host = "127.0.0.1".into();
        bp.health.port = 0;

        let broker = MockBroker::default();
        let twin = TwinRuntime::builder(bp, broker.clone())
            .sink(Arc::new(MemorySink::new("mem")))
            .build()
            .unwrap();
        twin.start().await.unwrap();
        let addr = twin.health_addr().unwrap();

        let (status, body) = http_get(addr, "/healthz").await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({"status": "ok", "check": "liveness"}));

        let (status, body) = http_get(addr, "/readyz").await;
        assert_eq!(status, 200);
        assert_eq!(body["check"], "readiness");

        broker.inject_json(TOPIC, &json!({"value": 3}));
        let metrics = twin.metrics();
        wait_for(|| metrics.messages_processed() == 1).await;
        let (status, body) = http_get(addr, "/metrics").await;
        assert_eq!(status, 200);
        assert_eq!(body["messages_processed"], 1);
        assert_eq!(body["queue"]["capacity"], 1000);

        let (status, _) = http_get(addr, "/nope").await;
        assert_eq!(status, 404);

        // server goes away with the runtime
        twin.stop().await;
        assert!(twin.health_addr().is_none());
        assert!(!twin.health_monitor().liveness());
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
