//! 1-D Kalman filter block
//!
//! Random-walk state model `x[k] = x[k-1] + w`, direct measurement `z = x + v`.
//! Anomalies are flagged on the normalized innovation
//! `|z - x_pred| / sqrt(P_pred + R)`.

use contracts::{IngressEnvelope, ModelOutput, TransformBlock, TransformContext, TwinError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Filter parameters (`[model].params`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanParams {
    /// Process noise variance Q
    pub process_noise: f64,
    /// Measurement noise variance R
    pub measurement_noise: f64,
    pub initial_estimate: f64,
    pub anomaly_threshold: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 0.01,
            measurement_noise: 0.1,
            initial_estimate: 0.0,
            anomaly_threshold: 3.0,
        }
    }
}

impl KalmanParams {
    fn from_context(context: &TransformContext) -> Result<Self, TwinError> {
        let defaults = Self::default();
        let read = |key: &str, default: f64| -> Result<f64, TwinError> {
            match context.params.get(key) {
                None => Ok(default),
                Some(_) => context
                    .param_f64(key)
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| {
                        TwinError::config_field(format!("model.params.{key}"), "must be a finite number")
                    }),
            }
        };

        let params = Self {
            process_noise: read("process_noise", defaults.process_noise)?,
            measurement_noise: read("measurement_noise", defaults.measurement_noise)?,
            initial_estimate: read("initial_estimate", defaults.initial_estimate)?,
            anomaly_threshold: read("anomaly_threshold", defaults.anomaly_threshold)?,
        };

        if params.process_noise < 0.0 {
            return Err(TwinError::config_field("model.params.process_noise", "must be >= 0"));
        }
        if params.measurement_noise <= 0.0 {
            return Err(TwinError::config_field("model.params.measurement_noise", "must be > 0"));
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy)]
struct FilterState {
    /// State estimate
    x: f64,
    /// Error covariance
    p: f64,
    message_count: u64,
}

/// One filter step
#[derive(Debug, Clone, Copy, PartialEq)]
struct Step {
    estimate: f64,
    innovation: f64,
    gain: f64,
    covariance: f64,
    normalized_innovation: f64,
}

#[derive(Debug)]
pub struct KalmanFilterBlock {
    params: KalmanParams,
    state: Mutex<FilterState>,
}

impl Default for KalmanFilterBlock {
    fn default() -> Self {
        Self::new(KalmanParams::default())
    }
}

impl KalmanFilterBlock {
    pub fn new(params: KalmanParams) -> Self {
        Self {
            params,
            state: Mutex::new(FilterState {
                x: params.initial_estimate,
                p: 1.0,
                message_count: 0,
            }),
        }
    }

    pub fn params(&self) -> KalmanParams {
        self.params
    }

    fn step(&self, z: f64) -> Step {
        let mut state = self.state.lock();
        let q = self.params.process_noise;
        let r = self.params.measurement_noise;

        // predict
        let x_pred = state.x;
        let p_pred = state.p + q;

        // update
        let innovation = z - x_pred;
        let s = p_pred + r;
        let gain = p_pred / s;
        state.x = x_pred + gain * innovation;
        state.p = (1.0 - gain) * p_pred;
        state.message_count += 1;

        Step {
            estimate: state.x,
            innovation,
            gain,
            covariance: state.p,
            normalized_innovation: innovation.abs() / s.sqrt(),
        }
    }
}

impl TransformBlock for KalmanFilterBlock {
    fn name(&self) -> &str {
        "kalman"
    }

    fn initialize(&mut self, context: &TransformContext) -> Result<(), TwinError> {
        let params = KalmanParams::from_context(context)?;
        *self = Self::new(params);
        info!(
            q = params.process_noise,
            r = params.measurement_noise,
            x0 = params.initial_estimate,
            threshold = params.anomaly_threshold,
            "kalman filter initialized"
        );
        Ok(())
    }

    fn process(&self, envelope: &IngressEnvelope) -> Result<ModelOutput, TwinError> {
        let z = envelope.value;
        let step = self.step(z);
        let anomaly = step.normalized_innovation > self.params.anomaly_threshold;

        if anomaly {
            warn!(
                asset_id = %envelope.asset_id,
                measurement = z,
                estimate = step.estimate,
                innovation = step.innovation,
                normalized = step.normalized_innovation,
                "anomaly detected"
            );
        }

        Ok(ModelOutput::new(z, step.estimate, anomaly)
            .with_residual(step.innovation)
            .with_field("kalman_gain", step.gain)
            .with_field("error_covariance", step.covariance)
            .with_field("normalized_innovation", step.normalized_innovation))
    }

    fn shutdown(&self) -> Result<(), TwinError> {
        let processed = self.state.lock().message_count;
        info!(processed, "kalman filter shut down");
        Ok(())
    }

    fn debug_state(&self) -> Option<Value> {
        let state = *self.state.lock();
        Some(json!({
            "x": state.x,
            "P": state.p,
            "Q": self.params.process_noise,
            "R": self.params.measurement_noise,
            "message_count": state.message_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::test_support::{context, envelope};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_first_step_by_hand() {
        let block = KalmanFilterBlock::default();
        let output = block.process(&envelope(1.0)).unwrap();

        // P_pred = 1.01, S = 1.11, K = 1.01 / 1.11
        let k = 1.01 / 1.11;
        assert!(close(output.twin_estimate.unwrap(), k));
        assert_eq!(output.residual, Some(1.0));
        assert!(close(output.extra["kalman_gain"].as_f64().unwrap(), k));
        assert!(close(output.extra["error_covariance"].as_f64().unwrap(), (1.0 - k) * 1.01));
        assert!(close(
            output.extra["normalized_innovation"].as_f64().unwrap(),
            1.0 / 1.11_f64.sqrt()
        ));
        assert_eq!(output.anomaly_flag, Some(false));
    }

    #[test]
    fn test_converges_and_flags_spike() {
        let mut block = KalmanFilterBlock::default();
        block
            .initialize(&context(json!({
                "initial_estimate": 70.0,
                "process_noise": 0.001,
                "measurement_noise": 0.5,
                "anomaly_threshold": 3.0,
            })))
            .unwrap();

        for _ in 0..50 {
            let output = block.process(&envelope(70.0)).unwrap();
            assert_eq!(output.anomaly_flag, Some(false));
        }

        let spike = block.process(&envelope(95.0)).unwrap();
        assert_eq!(spike.anomaly_flag, Some(true));
        assert!(spike.twin_estimate.unwrap() < 95.0);
    }

    #[test]
    fn test_debug_state_tracks_messages() {
        let block = KalmanFilterBlock::default();
        block.process(&envelope(1.0)).unwrap();
        block.process(&envelope(2.0)).unwrap();

        let state = block.debug_state().unwrap();
        assert_eq!(state["message_count"], 2);
        assert_eq!(state["Q"], 0.01);
        assert_eq!(state["R"], 0.1);
    }

    #[test]
    fn test_rejects_bad_noise() {
        let mut block = KalmanFilterBlock::default();
        let err = block
            .initialize(&context(json!({"measurement_noise": 0})))
            .unwrap_err();
        assert_eq!(err.detail("field").as_deref(), Some("model.params.measurement_noise"));

        let err = block
            .initialize(&context(json!({"process_noise": "lots"})))
            .unwrap_err();
        assert_eq!(err.detail("field").as_deref(), Some("model.params.process_noise"));
    }
}
