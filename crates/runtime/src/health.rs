//! Health monitor
//!
//! Liveness and readiness are recomputed on every call from live component
//! state, nothing is cached.

use std::sync::Arc;

use contracts::RuntimeState;
use observability::HealthProbe;
use parking_lot::RwLock;
use serde_json::{json, Value};

type Check = Arc<dyn Fn() -> bool + Send + Sync>;
type Report = Arc<dyn Fn() -> Value + Send + Sync>;

/// Probe handed to the health HTTP surface
#[derive(Clone)]
pub struct HealthMonitor {
    state: Arc<RwLock<RuntimeState>>,
    connected: Check,
    transform_ready: Check,
    sinks_present: Check,
    report: Report,
}

impl HealthMonitor {
    /// Monitor with every dependency reported as not ready
    pub fn new(state: Arc<RwLock<RuntimeState>>) -> Self {
        Self {
            state,
            connected: Arc::new(|| false),
            transform_ready: Arc::new(|| false),
            sinks_present: Arc::new(|| false),
            report: Arc::new(|| json!({})),
        }
    }

    pub fn with_connection(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.connected = Arc::new(check);
        self
    }

    pub fn with_transform(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.transform_ready = Arc::new(check);
        self
    }

    pub fn with_sinks(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.sinks_present = Arc::new(check);
        self
    }

    /// Source of the `/metrics` body
    pub fn with_report(mut self, report: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.report = Arc::new(report);
        self
    }

    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Per-dependency breakdown, used in logs and `stats()`
    pub fn checks(&self) -> Value {
        json!({
            "running": self.state().is_running(),
            "connected": (self.connected)(),
            "transform_initialized": (self.transform_ready)(),
            "sinks_present": (self.sinks_present)(),
        })
    }
}

impl HealthProbe for HealthMonitor {
    fn liveness(&self) -> bool {
        self.state().is_running()
    }

    fn readiness(&self) -> bool {
        self.state().is_running()
            && (self.connected)()
            && (self.transform_ready)()
            && (self.sinks_present)()
    }

    fn metrics(&self) -> Value {
        let mut report = (self.report)();
        if let Value::Object(map) = &mut report {
            map.insert("state".into(), json!(self.state().as_str()));
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flags {
        connected: Arc<AtomicBool>,
        transform: Arc<AtomicBool>,
        sinks: Arc<AtomicBool>,
    }

    fn monitor() -> (HealthMonitor, Arc<RwLock<RuntimeState>>, Flags) {
        let state = Arc::new(RwLock::new(RuntimeState::Stopped));
        let flags = Flags {
            connected: Arc::new(AtomicBool::new(false)),
            transform: Arc::new(AtomicBool::new(false)),
            sinks: Arc::new(AtomicBool::new(false)),
        };
        let (c, t, s) = (
            Arc::clone(&flags.connected),
            Arc::clone(&flags.transform),
            Arc::clone(&flags.sinks),
        );
        let monitor = HealthMonitor::new(Arc::clone(&state))
            .with_connection(move || c.load(Ordering::SeqCst))
            .with_transform(move || t.load(Ordering::SeqCst))
            .with_sinks(move || s.load(Ordering::SeqCst))
            .with_report(|| json!({ "messages_received": 7 }));
        (monitor, state, flags)
    }

    #[test]
    fn test_liveness_follows_state() {
        let (monitor, state, _) = monitor();
        assert!(!monitor.liveness());
        *state.write() = RuntimeState::Running;
        assert!(monitor.liveness());
        *state.write() = RuntimeState::Draining;
        assert!(!monitor.liveness());
    }

    #[test]
    fn test_readiness_requires_every_dependency() {
        let (monitor, state, flags) = monitor();
        *state.write() = RuntimeState::Running;
        assert!(!monitor.readiness());

        flags.connected.store(true, Ordering::SeqCst);
        flags.transform.store(true, Ordering::SeqCst);
        assert!(!monitor.readiness());
        flags.sinks.store(true, Ordering::SeqCst);
        assert!(monitor.readiness());

        for flag in [&flags.connected, &flags.transform, &flags.sinks] {
            flag.store(false, Ordering::SeqCst);
            assert!(!monitor.readiness());
            flag.store(true, Ordering::SeqCst);
            assert!(monitor.readiness());
        }

        *state.write() = RuntimeState::StoppedFinal;
        assert!(!monitor.readiness());
    }

    #[test]
    fn test_metrics_report_carries_state() {
        let (monitor, _, _) = monitor();
        let report = monitor.metrics();
        assert_eq!(report["messages_received"], 7);
        assert_eq!(report["state"], "stopped");
        assert_eq!(monitor.checks()["connected"], false);
    }
}
