//! Transform registry
//!
//! Maps `[model].kind` to a factory producing a fresh block.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{TransformBlock, TwinError};

use crate::blocks::{KalmanFilterBlock, PassthroughBlock, ScaleBlock};

pub type TransformFactory = Arc<dyn Fn() -> Box<dyn TransformBlock> + Send + Sync>;

#[derive(Clone, Default)]
pub struct TransformRegistry {
    factories: BTreeMap<String, TransformFactory>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl TransformRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `passthrough`, `scale` and `kalman`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("passthrough", || Box::new(PassthroughBlock));
        registry.register("scale", || Box::new(ScaleBlock::default()));
        registry.register("kalman", || Box::new(KalmanFilterBlock::default()));
        registry
    }

    /// Add or replace a factory
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn TransformBlock> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn create(&self, kind: &str) -> Result<Box<dyn TransformBlock>, TwinError> {
        let factory = self.factories.get(kind).ok_or_else(|| {
            TwinError::config_field("model.kind", format!("unknown transform kind '{kind}'"))
                .with_detail("available", self.kinds().join(", "))
        })?;
        Ok(factory())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}
