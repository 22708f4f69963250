//! # Transform
//!
//! Transform slot, registry and built-in model blocks.
//!
//! Responsibilities:
//! - `TransformSlot`: lifecycle guard around one `TransformBlock`
//! - `TransformRegistry`: `[model].kind` -> block factory
//! - Built-in blocks: `passthrough`, `scale`, `kalman`
//!
//! ## Usage Example
//!
//! ```ignore
//! use transform::{TransformRegistry, TransformSlot};
//!
//! let block = TransformRegistry::with_builtins().create("kalman")?;
//! let slot = TransformSlot::new(block);
//! slot.initialize(&context)?;
//! let output = slot.process(&envelope)?;
//! ```

mod blocks;
mod registry;
mod slot;

// Re-exports
pub use blocks::{KalmanFilterBlock, KalmanParams, PassthroughBlock, ScaleBlock};
pub use registry::{TransformFactory, TransformRegistry};
pub use slot::TransformSlot;
