//! Simulated asset
//!
//! Publishes temperature readings into the in-process broker: a slow sine
//! drift around a baseline, gaussian-ish noise and occasional spikes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contracts::topic::{MULTI_LEVEL_WILDCARD, SINGLE_LEVEL_WILDCARD};
use ingestion::MockBroker;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub asset_id: String,
    pub topic: String,
    pub interval: Duration,
    pub baseline: f64,
    pub noise: f64,
    pub anomaly_rate: f64,
    pub spike: f64,
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    pub fn new(asset_id: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            topic: topic.into(),
            interval: Duration::from_secs(1),
            baseline: 70.0,
            noise: 0.5,
            anomaly_rate: 0.05,
            spike: 25.0,
            seed: None,
        }
    }
}

/// Turn a subscription pattern into a topic it matches
///
/// `+` becomes the asset id, `#` becomes `temperature`.
pub fn concrete_topic(pattern: &str, asset_id: &str) -> String {
    pattern
        .split('/')
        .map(|segment| match segment {
            SINGLE_LEVEL_WILDCARD => asset_id,
            MULTI_LEVEL_WILDCARD => "temperature",
            other => other,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Reading generator
pub struct AssetSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    tick: u64,
}

impl AssetSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            rng,
            tick: 0,
        }
    }

    /// Next reading and whether it is a spike
    pub fn next_value(&mut self) -> (f64, bool) {
        self.tick += 1;
        let drift = (self.tick as f64 / 60.0).sin() * 2.0;
        // sum of uniforms, close enough to normal for telemetry noise
        let noise: f64 = (0..4).map(|_| self.rng.random_range(-1.0_f64..1.0)).sum::<f64>() / 2.0;
        let mut value = self.config.baseline + drift + noise * self.config.noise;

        let spike = self.rng.random_bool(self.config.anomaly_rate.clamp(0.0, 1.0));
        if spike {
            value += self.config.spike;
        }
        (value, spike)
    }

    pub fn next_payload(&mut self) -> Value {
        let (value, _) = self.next_value();
        json!({
            "asset_id": self.config.asset_id,
            "timestamp": Utc::now().to_rfc3339(),
            "value": (value * 1000.0).round() / 1000.0,
            "unit": "celsius",
            "metadata": { "source": "simulator", "sequence": self.tick },
        })
    }

    /// Publish into `broker` every interval until `running` clears
    pub fn spawn(mut self, broker: MockBroker, running: Arc<AtomicBool>) -> JoinHandle<u64> {
        tokio::spawn(async move {
            info!(
                topic = %self.config.topic,
                interval_ms = self.config.interval.as_millis() as u64,
                "Simulated asset started"
            );
            let mut ticker = tokio::time::interval(self.config.interval);
            let mut published = 0u64;
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                let payload = self.next_payload();
                if broker.inject_json(&self.config.topic, &payload) {
                    published += 1;
                } else {
                    debug!("Broker not accepting messages, reading skipped");
                }
            }
            info!(published, "Simulated asset stopped");
            published
        })
    }
}
