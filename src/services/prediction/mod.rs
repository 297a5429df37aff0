/// Prediction Module
///
/// Success, cost, and delivery-time estimation for one (request, candidate)
/// pair. Each target is a trainable regression model with a deterministic
/// heuristic fallback; selection happens once, when the set is loaded, never
/// per call.
pub mod heuristic;
pub mod model;

pub use model::{Regressor, Target};

use crate::config::{ModelConfig, PredictionConfig};
use crate::services::features::FeatureVector;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model inference failed: {0}")]
    Inference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, PredictionError>;

/// Estimates for one (request, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predictions {
    pub success_probability: f64,
    pub cost: f64,
    pub delivery_days: f64,
}

/// The three predictors, selected once at startup.
pub struct PredictorSet {
    success: Regressor,
    cost: Regressor,
    delivery: Regressor,
    /// Historical average cost per category, blended into heuristic cost
    /// estimates when present. Keyed by lowercase category.
    category_history: HashMap<String, f64>,
}

impl PredictorSet {
    /// Load persisted model artifacts; absent or corrupt artifacts select
    /// the heuristic per target.
    pub fn load(models: &ModelConfig, prediction: &PredictionConfig) -> Self {
        let set = Self {
            success: Regressor::load(
                models.success_path(),
                Target::SuccessProbability,
                prediction.clone(),
            ),
            cost: Regressor::load(models.cost_path(), Target::Cost, prediction.clone()),
            delivery: Regressor::load(
                models.delivery_path(),
                Target::DeliveryDays,
                prediction.clone(),
            ),
            category_history: HashMap::new(),
        };

        info!(
            success_model_backed = set.success.is_model_backed(),
            cost_model_backed = set.cost.is_model_backed(),
            delivery_model_backed = set.delivery.is_model_backed(),
            "Predictor set initialized"
        );

        set
    }

    /// Heuristic-only set (development and tests).
    pub fn heuristic(prediction: &PredictionConfig) -> Self {
        Self {
            success: Regressor::heuristic(Target::SuccessProbability, prediction.clone()),
            cost: Regressor::heuristic(Target::Cost, prediction.clone()),
            delivery: Regressor::heuristic(Target::DeliveryDays, prediction.clone()),
            category_history: HashMap::new(),
        }
    }

    /// Attach historical average costs per category.
    pub fn with_category_history(mut self, history: HashMap<String, f64>) -> Self {
        self.category_history = history
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self
    }

    /// Run all three predictors on one feature vector.
    pub fn predict(&self, features: &FeatureVector, category: Option<&str>) -> Predictions {
        let category_average = category
            .map(|c| c.to_lowercase())
            .and_then(|c| self.category_history.get(&c))
            .copied();

        Predictions {
            success_probability: self.success.predict(features, None),
            cost: self.cost.predict(features, category_average),
            delivery_days: self.delivery.predict(features, None),
        }
    }
}
