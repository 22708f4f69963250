//! TwinBlueprint - Config Loader output
//!
//! Describes one twin instance: identity and queueing, broker session,
//! transform selection, sink routing and the health surface.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{OverflowPolicy, TwinIdentity};

/// Complete twin configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TwinBlueprint {
    /// Identity, worker and queue settings
    #[validate(nested)]
    pub runtime: RuntimeSection,

    /// Broker session
    #[serde(default)]
    #[validate(nested)]
    pub broker: BrokerSection,

    /// Transform selection
    #[validate(nested)]
    pub model: ModelSection,

    /// Output routing; empty means the default stdout sink
    #[serde(default)]
    #[validate(nested)]
    pub sinks: Vec<SinkSpec>,

    /// Health / metrics HTTP surface
    #[serde(default)]
    #[validate(nested)]
    pub health: HealthSection,
}

impl TwinBlueprint {
    /// Identity stamped on every egress record
    pub fn identity(&self) -> TwinIdentity {
        TwinIdentity {
            twin_id: self.runtime.twin_id.clone(),
            asset_id: self.runtime.asset_id.clone(),
            model_version: self.model.version.clone(),
        }
    }
}

/// `[runtime]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RuntimeSection {
    #[validate(length(min = 1, message = "twin_id cannot be empty"))]
    pub twin_id: String,

    #[validate(length(min = 1, message = "asset_id cannot be empty"))]
    pub asset_id: String,

    /// Concurrent worker loops
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 32))]
    pub workers: usize,

    /// Bounded queue capacity
    #[serde(default = "default_queue_size")]
    #[validate(range(min = 1, max = 100000))]
    pub queue_size: usize,

    #[serde(default)]
    pub queue_overflow_policy: OverflowPolicy,

    /// Queue poll timeout used by workers to observe the stop signal
    #[serde(default = "default_worker_poll_interval_ms")]
    #[validate(range(min = 1, max = 60000))]
    pub worker_poll_interval_ms: u64,

    /// Bound on joining each worker during stop
    #[serde(default = "default_worker_join_timeout_ms")]
    #[validate(range(min = 1))]
    pub worker_join_timeout_ms: u64,

    /// Put timeout for the ingest task (only meaningful with `block`)
    #[serde(default = "default_enqueue_timeout_ms")]
    #[validate(range(min = 1))]
    pub enqueue_timeout_ms: u64,
}

impl RuntimeSection {
    pub fn new(twin_id: impl Into<String>, asset_id: impl Into<String>) -> Self {
        Self {
            twin_id: twin_id.into(),
            asset_id: asset_id.into(),
            workers: default_workers(),
            queue_size: default_queue_size(),
            queue_overflow_policy: OverflowPolicy::default(),
            worker_poll_interval_ms: default_worker_poll_interval_ms(),
            worker_join_timeout_ms: default_worker_join_timeout_ms(),
            enqueue_timeout_ms: default_enqueue_timeout_ms(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.worker_poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_join_timeout_ms)
    }

    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

fn default_workers() -> usize {
    1
}

fn default_queue_size() -> usize {
    1000
}

fn default_worker_poll_interval_ms() -> u64 {
    100
}

fn default_worker_join_timeout_ms() -> u64 {
    5000
}

fn default_enqueue_timeout_ms() -> u64 {
    1000
}

/// `[broker]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerSection {
    #[serde(default = "default_broker_host")]
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_broker_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(default = "default_qos")]
    #[validate(range(max = 2))]
    pub qos: u8,

    /// Subscription patterns (`+` / `#` wildcards)
    #[serde(default)]
    #[validate(length(min = 1, message = "at least one broker topic must be configured"))]
    pub topics: Vec<String>,

    #[serde(default = "default_reconnect_delay_min_ms")]
    #[validate(range(min = 1))]
    pub reconnect_delay_min_ms: u64,

    #[serde(default = "default_reconnect_delay_max_ms")]
    #[validate(range(min = 1))]
    pub reconnect_delay_max_ms: u64,

    #[serde(default = "default_connect_timeout_ms")]
    #[validate(range(min = 1))]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_keepalive_secs")]
    #[validate(range(min = 1))]
    pub keepalive_secs: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            host: default_broker_host(),
            port: default_broker_port(),
            client_id: None,
            username: None,
            password: None,
            qos: default_qos(),
            topics: Vec::new(),
            reconnect_delay_min_ms: default_reconnect_delay_min_ms(),
            reconnect_delay_max_ms: default_reconnect_delay_max_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

impl BrokerSection {
    pub fn reconnect_delay_min(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_min_ms)
    }

    pub fn reconnect_delay_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_max_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_broker_host() -> String {
    "localhost".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

fn default_qos() -> u8 {
    1
}

fn default_reconnect_delay_min_ms() -> u64 {
    1000
}

fn default_reconnect_delay_max_ms() -> u64 {
    60_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_keepalive_secs() -> u64 {
    60
}

/// `[model]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelSection {
    /// Transform registry key (e.g. "kalman")
    #[validate(length(min = 1, message = "model kind cannot be empty"))]
    pub kind: String,

    #[serde(default = "default_model_version")]
    pub version: String,

    /// Free-form parameters passed to the transform on initialize
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ModelSection {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            version: default_model_version(),
            params: Map::new(),
        }
    }
}

fn default_model_version() -> String {
    "1.0.0".to_string()
}

/// `[[sinks]]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SinkSpec {
    /// Unique sink name (logging/metrics)
    #[validate(length(min = 1, message = "sink name cannot be empty"))]
    pub name: String,

    /// Sink registry key (e.g. "csv")
    #[validate(length(min = 1, message = "sink kind cannot be empty"))]
    pub kind: String,

    /// Sink-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl SinkSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// `[health]`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct HealthSection {
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,

    #[serde(default = "default_health_host")]
    #[validate(length(min = 1))]
    pub host: String,

    /// 0 binds an ephemeral port
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

impl HealthSection {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    8080
}
