//! Transform slot
//!
//! Holds the single `TransformBlock` instance of a runtime and enforces its
//! lifecycle: initialize once, process only while initialized, shut down at
//! most once. Panics raised by the block are converted into `Transform` errors.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use contracts::{IngressEnvelope, ModelOutput, TransformBlock, TransformContext, TwinError};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

pub struct TransformSlot {
    name: String,
    block: RwLock<Box<dyn TransformBlock>>,
    initialized: AtomicBool,
}

impl std::fmt::Debug for TransformSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformSlot")
            .field("name", &self.name)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl TransformSlot {
    pub fn new(block: Box<dyn TransformBlock>) -> Self {
        Self {
            name: block.name().to_string(),
            block: RwLock::new(block),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Run the block's one-time setup
    ///
    /// # Errors
    /// - `Transform` if the slot is already initialized
    /// - whatever the block returns, or `Transform` if it panics
    #[instrument(
        name = "transform_initialize",
        skip(self, context),
        fields(transform = %self.name, twin_id = %context.identity.twin_id)
    )]
    pub fn initialize(&self, context: &TransformContext) -> Result<(), TwinError> {
        let mut block = self.block.write();
        if self.is_initialized() {
            return Err(TwinError::transform(format!(
                "transform '{}' is already initialized",
                self.name
            ))
            .with_detail("transform", &self.name));
        }

        catch_unwind(AssertUnwindSafe(|| block.initialize(context)))
            .map_err(|panic| self.panicked("initialize", panic))??;

        self.initialized.store(true, Ordering::SeqCst);
        info!(params = context.params.len(), "transform initialized");
        Ok(())
    }

    /// Transform one envelope
    pub fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError> {
        if !self.is_initialized() {
            return Err(TwinError::transform(format!(
                "transform '{}' is not initialized",
                self.name
            ))
            .with_detail("transform", &self.name));
        }

        let block = self.block.read();
        catch_unwind(AssertUnwindSafe(|| block.process(envelope)))
            .map_err(|panic| self.panicked("process", panic))?
    }

    /// Release the block; never fails and runs at most once per initialize
    #[instrument(name = "transform_shutdown", skip(self), fields(transform = %self.name))]
    pub fn shutdown(&self) {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            debug!("transform not initialized, nothing to shut down");
            return;
        }

        let block = self.block.read();
        match catch_unwind(AssertUnwindSafe(|| block.shutdown())) {
            Ok(Ok(())) => info!("transform shut down"),
            Ok(Err(e)) => warn!(error = %e, "transform shutdown failed"),
            Err(panic) => {
                let e = self.panicked("shutdown", panic);
                error!(error = %e, "transform shutdown panicked");
            }
        }
    }

    pub fn debug_state(&self) -> Option<Value> {
        let block = self.block.read();
        catch_unwind(AssertUnwindSafe(|| block.debug_state())).unwrap_or(None)
    }

    fn panicked(&self, stage: &str, panic: Box<dyn Any + Send>) -> TwinError {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        TwinError::transform(format!("transform '{}' panicked in {stage}: {reason}", self.name))
            .with_detail("transform", &self.name)
            .with_detail("stage", stage)
    }
}
