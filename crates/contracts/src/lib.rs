//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the twin runtime:
//! data model, error taxonomy, capability traits and the configuration blueprint.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - All timestamps are `chrono::DateTime<Utc>`
//! - `timestamp` is the measurement time, `received_at` / `processed_at` are wall-clock stamps

mod blueprint;
mod error;
mod message;
mod queue;
mod record;
mod sink;
mod state;
pub mod topic;
mod transform;
mod transport;

pub use blueprint::*;
pub use error::*;
pub use message::*;
pub use queue::{OverflowPolicy, QueueStats};
pub use record::*;
pub use sink::DataSink;
pub use state::{ConnectorState, RuntimeState};
pub use transform::{TransformBlock, TransformContext};
pub use transport::{BrokerTransport, LocalBrokerTransport, TransportEvent};
