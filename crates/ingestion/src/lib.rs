//! # Ingestion
//!
//! Everything between the broker and the worker pool.
//!
//! Responsibilities:
//! - `BoundedQueue`: fixed-capacity buffer with drop_oldest / drop_newest / block
//! - `Connector`: broker session, reconnect with exponential backoff, topic routing
//! - `MockBroker`: in-memory `BrokerTransport` for tests and simulation
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{Connector, ConnectorConfig, MockBroker};
//!
//! let broker = MockBroker::default();
//! let connector = Connector::new(broker.clone(), ConnectorConfig::default(), metrics);
//! let (tx, rx) = async_channel::bounded(100);
//! connector.subscribe("sensors/+/temperature", tx).await?;
//! connector.connect().await?;
//! while let Ok(message) = rx.recv().await {
//!     queue.put(message, Some(timeout)).await?;
//! }
//! ```

mod backoff;
mod connector;
mod mock_broker;
mod queue;
mod routes;

// Re-exports
pub use backoff::Backoff;
pub use connector::{Connector, ConnectorConfig, Route};
pub use mock_broker::MockBroker;
pub use queue::BoundedQueue;
pub use routes::{patterns_overlap, RouteTable};
