/// Regression Model Inference
///
/// Loads ONNX-exported regression models with tract-onnx, one per prediction
/// target. A missing or unreadable artifact is not an error: the regressor
/// silently selects the deterministic heuristic for its target and the
/// degradation is logged once, at load time.
use super::{heuristic, PredictionError, Result};
use crate::config::PredictionConfig;
use crate::services::features::{FeatureVector, FEATURE_VECTOR_SIZE};
use crate::utils::clamp_unit;
use ndarray::Array2;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tract_onnx::prelude::{tvec, Framework, InferenceModelExt, Tensor};

type OnnxPlan = tract_onnx::prelude::SimplePlan<
    tract_onnx::prelude::TypedFact,
    Box<dyn tract_onnx::prelude::TypedOp>,
    tract_onnx::prelude::Graph<
        tract_onnx::prelude::TypedFact,
        Box<dyn tract_onnx::prelude::TypedOp>,
    >,
>;

/// What a regressor estimates, with the sane bounds for that target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    SuccessProbability,
    Cost,
    DeliveryDays,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::SuccessProbability => "success_probability",
            Target::Cost => "cost",
            Target::DeliveryDays => "delivery_days",
        }
    }

    /// Bounds-check a raw estimate before it leaves the predictor.
    fn clamp(&self, raw: f64) -> f64 {
        match self {
            Target::SuccessProbability => clamp_unit(raw),
            Target::Cost => {
                if raw.is_finite() {
                    raw.max(1.0)
                } else {
                    1.0
                }
            }
            Target::DeliveryDays => {
                if raw.is_finite() {
                    raw.max(1.0)
                } else {
                    1.0
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RegressorKind {
    Onnx,
    Heuristic,
}

/// One trainable regressor with a heuristic fallback.
pub struct Regressor {
    plan: Option<Arc<OnnxPlan>>,
    kind: RegressorKind,
    target: Target,
    config: PredictionConfig,
}

impl Regressor {
    /// Load the ONNX artifact for `target`, falling back to the heuristic
    /// when the file is missing or corrupt.
    pub fn load<P: AsRef<Path>>(path: P, target: Target, config: PredictionConfig) -> Self {
        let path = path.as_ref();

        match Self::try_load_onnx(path) {
            Ok(plan) => {
                debug!(
                    target = target.as_str(),
                    path = %path.display(),
                    "Loaded ONNX regression model"
                );
                Self {
                    plan: Some(Arc::new(plan)),
                    kind: RegressorKind::Onnx,
                    target,
                    config,
                }
            }
            Err(e) => {
                warn!(
                    target = target.as_str(),
                    path = %path.display(),
                    error = %e,
                    "No usable regression model, falling back to heuristic estimates"
                );
                Self::heuristic(target, config)
            }
        }
    }

    /// Heuristic-only regressor (development, tests, missing artifacts).
    pub fn heuristic(target: Target, config: PredictionConfig) -> Self {
        Self {
            plan: None,
            kind: RegressorKind::Heuristic,
            target,
            config,
        }
    }

    pub fn is_model_backed(&self) -> bool {
        matches!(self.kind, RegressorKind::Onnx)
    }

    /// Estimate the target value for one feature vector.
    ///
    /// Infallible: an inference failure on the model path degrades to the
    /// heuristic for that call rather than surfacing an error. The result is
    /// always within the target's bounds.
    pub fn predict(&self, features: &FeatureVector, category_average: Option<f64>) -> f64 {
        let raw = match self.kind {
            RegressorKind::Onnx => match self.predict_onnx(features) {
                Ok(value) => value,
                Err(e) => {
                    warn!(
                        target = self.target.as_str(),
                        error = %e,
                        "Model inference failed, using heuristic for this call"
                    );
                    self.predict_heuristic(features, category_average)
                }
            },
            RegressorKind::Heuristic => self.predict_heuristic(features, category_average),
        };

        self.target.clamp(raw)
    }

    fn predict_heuristic(&self, features: &FeatureVector, category_average: Option<f64>) -> f64 {
        match self.target {
            Target::SuccessProbability => heuristic::success_probability(features),
            Target::Cost => heuristic::cost_estimate(features, &self.config, category_average),
            Target::DeliveryDays => heuristic::delivery_days(features, &self.config),
        }
    }

    fn predict_onnx(&self, features: &FeatureVector) -> Result<f64> {
        let plan = self.plan.as_ref().ok_or_else(|| {
            PredictionError::Inference("ONNX plan not loaded".to_string())
        })?;

        let row = Array2::from_shape_vec((1, FEATURE_VECTOR_SIZE), features.to_array().to_vec())
            .map_err(|e| {
                PredictionError::InvalidInput(format!("Failed to build feature matrix: {}", e))
            })?;
        let input_tensor = tract_onnx::prelude::tract_ndarray::Array2::from_shape_fn(
            (1, FEATURE_VECTOR_SIZE),
            |(i, j)| row[[i, j]],
        );

        let input = tvec![Tensor::from(input_tensor.into_dyn()).into()];
        let output = plan
            .run(input)
            .map_err(|e| PredictionError::Inference(format!("ONNX inference failed: {}", e)))?;

        let view = output[0].to_array_view::<f32>().map_err(|e| {
            PredictionError::Inference(format!("Output extraction failed: {}", e))
        })?;

        view.iter()
            .next()
            .map(|v| *v as f64)
            .ok_or_else(|| PredictionError::Inference("Empty model output".to_string()))
    }

    fn try_load_onnx(path: &Path) -> std::result::Result<OnnxPlan, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Err(format!("Model file not found: {}", path.display()).into());
        }

        let plan = tract_onnx::onnx()
            .model_for_path(path)?

            .into_optimized()?
            .into_runnable()?;

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> FeatureVector {
        FeatureVector {
            process_overlap: 1.0,
            material_overlap: 1.0,
            certification_coverage: 1.0,
            rating_norm: 0.9,
            on_time_rate: 0.95,
            completed_orders: 80.0,
            years_in_business: 8.0,
            capacity_utilization: 0.5,
            location_match: 1.0,
            quantity: 250.0,
            requirement_complexity: 1.0,
            specialty_material_share: 0.0,
            industry_cost_factor: 1.0,
            is_rush: 0.0,
            deadline_slack_days: 21.0,
            required_certifications: 0.0,
        }
    }

    #[test]
    fn test_missing_model_selects_heuristic() {
        let regressor = Regressor::load(
            "/nonexistent/success.onnx",
            Target::SuccessProbability,
            PredictionConfig::default(),
        );
        assert!(!regressor.is_model_backed());

        let value = regressor.predict(&features(), None);
        assert!((0.0..=1.0).contains(&value));
    }

    #[test]
    fn test_bounds_per_target() {
        let config = PredictionConfig::default();
        let success =
            Regressor::heuristic(Target::SuccessProbability, config.clone()).predict(&features(), None);
        assert!((0.0..=1.0).contains(&success));

        let cost = Regressor::heuristic(Target::Cost, config.clone()).predict(&features(), None);
        assert!(cost >= 1.0);

        let days = Regressor::heuristic(Target::DeliveryDays, config).predict(&features(), None);
        assert!(days >= 1.0);
    }

    #[test]
    fn test_deterministic() {
        let regressor =
            Regressor::heuristic(Target::Cost, PredictionConfig::default());
        let f = features();
        assert_eq!(regressor.predict(&f, None), regressor.predict(&f, None));
    }

    #[test]
    fn test_target_clamp_rejects_nonfinite() {
        assert_eq!(Target::Cost.clamp(f64::NAN), 1.0);
        assert_eq!(Target::DeliveryDays.clamp(f64::NEG_INFINITY), 1.0);
        assert_eq!(Target::SuccessProbability.clamp(f64::NAN), 0.5);
    }
}
