//! # Runtime
//!
//! Lifecycle controller for one digital twin.
//!
//! Responsibilities:
//! - Assemble connector, bounded queue, transform slot and sink set from a `TwinBlueprint`
//! - Run the ingest task and the worker pool
//! - Roll back a failed start, drain on stop
//! - Answer liveness / readiness and serve the health surface
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::MockBroker;
//! use runtime::TwinRuntime;
//!
//! let runtime = TwinRuntime::from_blueprint(blueprint, MockBroker::default())?;
//! runtime.run_until(async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! println!("{:?}", runtime.stats());
//! ```

mod controller;
mod health;
mod stats;
mod worker;

// Re-exports
pub use controller::{RuntimeBuilder, TwinRuntime};
pub use health::HealthMonitor;
pub use stats::{RuntimeStats, SinkStats};
pub use worker::{process_message, run_worker, WorkerContext};
