use contracts::{IngressEnvelope, ModelOutput, TransformBlock, TransformContext, TwinError};

/// Echoes the measured value as the estimate
#[derive(Debug, Default)]
pub struct PassthroughBlock;

impl TransformBlock for PassthroughBlock {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn initialize(&mut self, _context: &TransformContext) -> Result<(), TwinError> {
        Ok(())
    }

    fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError> {
        Ok(ModelOutput::new(envelope.value, envelope.value, false).with_residual(0.0))
    }
}
