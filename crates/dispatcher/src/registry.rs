//! SinkRegistry - resolves `[[sinks]].kind` to a constructor

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{DataSink, SinkSpec, TwinError};
use tracing::{debug, instrument};

use crate::sinks::{CsvSink, LogSink, StdoutSink};

pub type SinkFactory = Arc<dyn Fn(&SinkSpec) -> Result<Arc<dyn DataSink>, TwinError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct SinkRegistry {
    factories: BTreeMap<String, SinkFactory>,
}

impl std::fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `stdout`, `csv` and `log`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register("stdout", |spec| {
                Ok(Arc::new(StdoutSink::from_params(&spec.name, &spec.params)?))
            })
            .register("csv", |spec| {
                Ok(Arc::new(CsvSink::from_params(&spec.name, &spec.params)?))
            })
            .register("log", |spec| Ok(Arc::new(LogSink::new(&spec.name))));
        registry
    }

    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&SinkSpec) -> Result<Arc<dyn DataSink>, TwinError> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    #[instrument(name = "sink_registry_build", skip(self, spec), fields(sink = %spec.name, kind = %spec.kind))]
    pub fn build(&self, spec: &SinkSpec) -> Result<Arc<dyn DataSink>, TwinError> {
        let factory = self.factories.get(&spec.kind).ok_or_else(|| {
            TwinError::sink(&spec.name, format!("unknown sink kind '{}'", spec.kind))
                .with_detail("kind", &spec.kind)
                .with_detail("available", self.kinds().join(", "))
        })?;
        let sink = factory(spec)?;
        debug!("sink created");
        Ok(sink)
    }

    /// Build every spec, in order
    pub fn build_all(&self, specs: &[SinkSpec]) -> Result<Vec<Arc<dyn DataSink>>, TwinError> {
        specs.iter().map(|spec| self.build(spec)).collect()
    }
}
