// Factor weight snapshots.
//
// FactorWeights is immutable once published; the store swaps whole
// snapshots so concurrent scoring calls never observe a partially updated
// weight set. The sum-to-one invariant is enforced at every publish.

use crate::models::{Factor, FactorScores};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Tolerance for the sum-to-one invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum WeightError {
    #[error("Weight state failed to renormalize: {0}")]
    Renormalize(String),
}

/// A versioned, immutable mapping from factor to importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorWeights {
    pub version: u64,
    weights: HashMap<Factor, f64>,
}

impl FactorWeights {
    /// The starting point before any feedback has been learned.
    pub fn balanced() -> Self {
        let weights = HashMap::from([
            (Factor::ProcessMatch, 0.20),
            (Factor::CostCompatibility, 0.15),
            (Factor::Timeline, 0.15),
            (Factor::Geographic, 0.10),
            (Factor::Capacity, 0.10),
            (Factor::Quality, 0.15),
            (Factor::UrgencyAlignment, 0.05),
            (Factor::TechnicalSpec, 0.10),
        ]);
        Self {
            version: 1,
            weights,
        }
    }

    pub fn get(&self, factor: Factor) -> f64 {
        self.weights.get(&factor).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        Factor::ALL.iter().map(|f| self.get(*f)).sum()
    }

    /// Build a new snapshot from raw per-factor values, renormalizing so the
    /// sum is exactly 1.0. Fails when the raw mass is non-positive or not
    /// finite; callers keep their previous snapshot in that case.
    pub fn from_raw(version: u64, raw: HashMap<Factor, f64>) -> Result<Self, WeightError> {
        let mass: f64 = Factor::ALL
            .iter()
            .map(|f| raw.get(f).copied().unwrap_or(0.0))
            .sum();

        if !mass.is_finite() || mass <= 0.0 {
            return Err(WeightError::Renormalize(format!(
                "total weight mass {} is unusable",
                mass
            )));
        }

        let weights = Factor::ALL
            .iter()
            .map(|f| (*f, raw.get(f).copied().unwrap_or(0.0).max(0.0) / mass))
            .collect();

        Ok(Self { version, weights })
    }

    /// Weighted composite of a sub-score breakdown.
    pub fn weighted_sum(&self, scores: &FactorScores) -> f64 {
        scores.iter().map(|(f, s)| self.get(f) * s).sum()
    }

    pub fn as_map(&self) -> &HashMap<Factor, f64> {
        &self.weights
    }
}

/// Process-wide weight state: one global snapshot plus optional per-segment
/// overrides, all swapped atomically.
pub struct WeightStore {
    global: RwLock<Arc<FactorWeights>>,
    segments: RwLock<HashMap<String, Arc<FactorWeights>>>,
}

impl Default for WeightStore {
    fn default() -> Self {
        Self::new(FactorWeights::balanced())
    }
}

impl WeightStore {
    pub fn new(initial: FactorWeights) -> Self {
        Self {
            global: RwLock::new(Arc::new(initial)),
            segments: RwLock::new(HashMap::new()),
        }
    }

    /// Immutable snapshot of the global weights.
    pub fn snapshot(&self) -> Arc<FactorWeights> {
        self.global.read().expect("weight lock poisoned").clone()
    }

    /// Snapshot for a segment, falling back to the global weights.
    pub fn snapshot_for(&self, segment: Option<&str>) -> Arc<FactorWeights> {
        if let Some(segment) = segment {
            let segments = self.segments.read().expect("weight lock poisoned");
            if let Some(weights) = segments.get(&segment.to_lowercase()) {
                return weights.clone();
            }
        }
        self.snapshot()
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    /// Publish a new global snapshot. On renormalization failure the last
    /// known-good snapshot stays live and the error is returned.
    pub fn publish(&self, raw: HashMap<Factor, f64>) -> Result<Arc<FactorWeights>, WeightError> {
        let next_version = self.version() + 1;
        match FactorWeights::from_raw(next_version, raw) {
            Ok(weights) => {
                let weights = Arc::new(weights);
                *self.global.write().expect("weight lock poisoned") = weights.clone();
                debug!(version = weights.version, "Published weight snapshot");
                Ok(weights)
            }
            Err(e) => {
                warn!(error = %e, "Rejected corrupt weight update, keeping last good snapshot");
                Err(e)
            }
        }
    }

    /// Publish a per-segment override.
    pub fn publish_segment(
        &self,
        segment: &str,
        raw: HashMap<Factor, f64>,
    ) -> Result<Arc<FactorWeights>, WeightError> {
        let key = segment.to_lowercase();
        let next_version = self
            .segments
            .read()
            .expect("weight lock poisoned")
            .get(&key)
            .map(|w| w.version + 1)
            .unwrap_or(1);

        match FactorWeights::from_raw(next_version, raw) {
            Ok(weights) => {
                let weights = Arc::new(weights);
                self.segments
                    .write()
                    .expect("weight lock poisoned")
                    .insert(key, weights.clone());
                Ok(weights)
            }
            Err(e) => {
                warn!(segment = %segment, error = %e, "Rejected corrupt segment weights");
                Err(e)
            }
        }
    }

    pub fn segment_names(&self) -> Vec<String> {
        self.segments
            .read()
            .expect("weight lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_weights_sum_to_one() {
        let weights = FactorWeights::balanced();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_from_raw_renormalizes() {
        let raw = Factor::ALL.iter().map(|f| (*f, 2.0)).collect();
        let weights = FactorWeights::from_raw(2, raw).unwrap();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((weights.get(Factor::Quality) - 0.125).abs() < 1e-9);
    }

    #[test]
    fn test_corrupt_update_keeps_last_good() {
        let store = WeightStore::default();
        let before = store.snapshot();

        let corrupt: HashMap<Factor, f64> = Factor::ALL.iter().map(|f| (*f, f64::NAN)).collect();
        assert!(store.publish(corrupt).is_err());

        let after = store.snapshot();
        assert_eq!(before.version, after.version);
        assert!((after.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_snapshot_isolation() {
        let store = WeightStore::default();
        let old = store.snapshot();

        let mut raw: HashMap<Factor, f64> =
            Factor::ALL.iter().map(|f| (*f, old.get(*f))).collect();
        raw.insert(Factor::Quality, 0.5);
        store.publish(raw).unwrap();

        // The earlier snapshot is untouched by the swap
        assert!((old.get(Factor::Quality) - 0.15).abs() < 1e-9);
        assert!(store.snapshot().get(Factor::Quality) > 0.2);
        assert_eq!(store.version(), old.version + 1);
    }

    #[test]
    fn test_segment_override_fallback() {
        let store = WeightStore::default();
        assert_eq!(
            store.snapshot_for(Some("aerospace")).version,
            store.snapshot().version
        );

        let mut raw: HashMap<Factor, f64> = Factor::ALL.iter().map(|f| (*f, 0.1)).collect();
        raw.insert(Factor::Timeline, 0.4);
        store.publish_segment("Aerospace", raw).unwrap();

        let segment = store.snapshot_for(Some("aerospace"));
        assert!(segment.get(Factor::Timeline) > store.snapshot().get(Factor::Timeline));
        assert!((segment.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }
}
