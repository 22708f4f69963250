//! Lifecycle states shared between runtime, connector and health surface

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

/// Runtime controller lifecycle
///
/// `Stopped -> Starting -> Running -> Draining -> StoppedFinal`; a failed start
/// returns to `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeState {
    #[default]
    Stopped,
    Starting,
    Running,
    Draining,
    StoppedFinal,
}

impl RuntimeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::StoppedFinal => "stopped_final",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broker session state, owned by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before the next reconnect attempt
    Backoff(Duration),
}

impl ConnectorState {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Backoff(delay) => write!(f, "backoff({}ms)", delay.as_millis()),
        }
    }
}

impl Serialize for ConnectorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_state_serialization() {
        let json = serde_json::to_string(&RuntimeState::StoppedFinal).unwrap();
        assert_eq!(json, "\"stopped_final\"");
        assert!(RuntimeState::Running.is_running());
        assert!(!RuntimeState::Draining.is_running());
    }

    #[test]
    fn test_connector_state_display() {
        let state = ConnectorState::Backoff(Duration::from_millis(2000));
        assert_eq!(state.to_string(), "backoff(2000ms)");
        assert!(!state.is_connected());
        assert!(ConnectorState::Connected.is_connected());
    }
}
