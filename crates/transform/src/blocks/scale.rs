use contracts::{IngressEnvelope, ModelOutput, TransformBlock, TransformContext, TwinError};
use tracing::debug;

/// `estimate = value * factor`, `residual = value - estimate`
///
/// Params: `factor` (default 1.0), optional `anomaly_threshold` on |residual|.
#[derive(Debug)]
pub struct ScaleBlock {
    factor: f64,
    anomaly_threshold: Option<f64>,
}

impl Default for ScaleBlock {
    fn default() -> Self {
        Self {
            factor: 1.0,
            anomaly_threshold: None,
        }
    }
}

impl ScaleBlock {
    pub fn with_factor(factor: f64) -> Self {
        Self {
            factor,
            ..Self::default()
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }
}

impl TransformBlock for ScaleBlock {
    fn name(&self) -> &str {
        "scale"
    }

    fn initialize(&mut self, context: &TransformContext) -> Result<(), TwinError> {
        if context.params.contains_key("factor") {
            self.factor = context
                .param_f64("factor")
                .filter(|f| f.is_finite())
                .ok_or_else(|| TwinError::config_field("model.params.factor", "must be a finite number"))?;
        }
        self.anomaly_threshold = context.param_f64("anomaly_threshold");
        debug!(factor = self.factor, threshold = ?self.anomaly_threshold, "scale block configured");
        Ok(())
    }

    fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError> {
        let estimate = envelope.value * self.factor;
        let residual = envelope.value - estimate;
        let anomaly = self
            .anomaly_threshold
            .is_some_and(|threshold| residual.abs() > threshold);
        Ok(ModelOutput::new(envelope.value, estimate, anomaly).with_residual(residual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::test_support::{context, envelope};
    use serde_json::json;

    #[test]
    fn test_half_scale() {
        let mut block = ScaleBlock::default();
        block.initialize(&context(json!({"factor": 0.5}))).unwrap();

        let output = block.process(&envelope(10.0)).unwrap();
        assert_eq!(output.raw_value, Some(10.0));
        assert_eq!(output.twin_estimate, Some(5.0));
        assert_eq!(output.residual, Some(5.0));
        assert_eq!(output.anomaly_flag, Some(false));
    }

    #[test]
    fn test_threshold_and_string_factor() {
        let mut block = ScaleBlock::default();
        block
            .initialize(&context(json!({"factor": "0.5", "anomaly_threshold": 2.0})))
            .unwrap();
        assert_eq!(block.factor(), 0.5);
        assert_eq!(block.process(&envelope(10.0)).unwrap().anomaly_flag, Some(true));
        assert_eq!(block.process(&envelope(2.0)).unwrap().anomaly_flag, Some(false));
    }

    #[test]
    fn test_invalid_factor() {
        let mut block = ScaleBlock::default();
        let err = block.initialize(&context(json!({"factor": "abc"}))).unwrap_err();
        assert_eq!(err.detail("field").as_deref(), Some("model.params.factor"));
    }
}
