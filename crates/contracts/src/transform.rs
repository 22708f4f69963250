//! TransformBlock trait - user-supplied model interface

use serde_json::{Map, Value};

use crate::{IngressEnvelope, ModelOutput, TwinError, TwinIdentity};

/// Context handed to a transform on initialize
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub identity: TwinIdentity,
    /// `[model].params`
    pub params: Map<String, Value>,
}

impl TransformContext {
    pub fn new(identity: TwinIdentity, params: Map<String, Value>) -> Self {
        Self { identity, params }
    }

    /// Numeric parameter; numeric strings are accepted
    pub fn param_f64(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(crate::value_as_f64)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// Pluggable transformation
///
/// `process` takes `&self`: a block used with more than one worker must
/// tolerate concurrent calls (typically via interior locking).
pub trait TransformBlock: Send + Sync {
    /// Block name (used for logging)
    fn name(&self) -> &str;

    /// One-time setup, called before any `process`
    fn initialize(&mut self, context: &TransformContext) -> Result<(), TwinError>;

    /// Transform one message
    fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError>;

    /// Release resources
    fn shutdown(&self) -> Result<(), TwinError> {
        Ok(())
    }

    /// Internal state for diagnostics
    fn debug_state(&self) -> Option<Value> {
        None
    }
}
