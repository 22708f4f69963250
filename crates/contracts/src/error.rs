//! Layered error definitions
//!
//! Categorized by source: configuration / connection / transform / sink / queue / validation / shutdown.
//! Every variant carries a human readable message plus a structured detail map.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Structured key/value context attached to an error
pub type ErrorDetails = BTreeMap<String, String>;

/// Result alias used across the workspace
pub type TwinResult<T> = std::result::Result<T, TwinError>;

/// Unified error type
#[derive(Debug, Error)]
pub enum TwinError {
    /// Invalid or unloadable configuration
    #[error("configuration error: {message}")]
    Configuration { message: String, details: ErrorDetails },

    /// Broker connection or session failure
    #[error("connection error: {message}")]
    Connection { message: String, details: ErrorDetails },

    /// Transform initialization or processing failure
    #[error("transform error: {message}")]
    Transform { message: String, details: ErrorDetails },

    /// Sink open / write / flush / close failure
    #[error("sink error: {message}")]
    Sink { message: String, details: ErrorDetails },

    /// Bounded queue stayed full for the whole put timeout
    #[error("queue overflow: {message}")]
    QueueOverflow { message: String, details: ErrorDetails },

    /// Malformed input (topic pattern, payload, field)
    #[error("validation error: {message}")]
    Validation { message: String, details: ErrorDetails },

    /// Failure while tearing a component down
    #[error("shutdown error: {message}")]
    Shutdown { message: String, details: ErrorDetails },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error category, used for matching without destructuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Transform,
    Sink,
    QueueOverflow,
    Validation,
    Shutdown,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Transform => "transform",
            Self::Sink => "sink",
            Self::QueueOverflow => "queue_overflow",
            Self::Validation => "validation",
            Self::Shutdown => "shutdown",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

impl TwinError {
    /// Create configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Create configuration error pointing at a specific field
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::Configuration {
            message: format!("'{field}': {message}"),
            details: ErrorDetails::from([("field".to_string(), field)]),
        }
    }

    /// Create connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Create transform error
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Create sink error tagged with the sink name
    pub fn sink(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
            details: ErrorDetails::from([("sink".to_string(), sink_name.into())]),
        }
    }

    /// Create queue overflow error
    pub fn queue_overflow(message: impl Into<String>) -> Self {
        Self::QueueOverflow {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Create validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Create shutdown error
    pub fn shutdown(message: impl Into<String>) -> Self {
        Self::Shutdown {
            message: message.into(),
            details: ErrorDetails::new(),
        }
    }

    /// Attach a detail entry. No-op for `Io`.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        if let Some(details) = self.details_mut() {
            details.insert(key.into(), value.to_string());
        }
        self
    }

    /// Error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Transform { .. } => ErrorKind::Transform,
            Self::Sink { .. } => ErrorKind::Sink,
            Self::QueueOverflow { .. } => ErrorKind::QueueOverflow,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Shutdown { .. } => ErrorKind::Shutdown,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Structured details, empty for `Io`
    pub fn details(&self) -> ErrorDetails {
        match self {
            Self::Configuration { details, .. }
            | Self::Connection { details, .. }
            | Self::Transform { details, .. }
            | Self::Sink { details, .. }
            | Self::QueueOverflow { details, .. }
            | Self::Validation { details, .. }
            | Self::Shutdown { details, .. } => details.clone(),
            Self::Io(_) => ErrorDetails::new(),
        }
    }

    /// Lookup a single detail value
    pub fn detail(&self, key: &str) -> Option<String> {
        self.details().get(key).cloned()
    }

    fn details_mut(&mut self) -> Option<&mut ErrorDetails> {
        match self {
            Self::Configuration { details, .. }
            | Self::Connection { details, .. }
            | Self::Transform { details, .. }
            | Self::Sink { details, .. }
            | Self::QueueOverflow { details, .. }
            | Self::Validation { details, .. }
            | Self::Shutdown { details, .. } => Some(details),
            Self::Io(_) => None,
        }
    }
}
