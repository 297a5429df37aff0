use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Engine-wide configuration.
///
/// Every tunable the engine depends on lives here with a documented default;
/// all of them can be overridden through the environment. None of the numeric
/// defaults are load-bearing business rules.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub models: ModelConfig,
    pub prediction: PredictionConfig,
    pub learning: LearningConfig,
}

/// Confidence tier bands, reasoning thresholds, and per-call adjustments.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Composite score floor for EXCELLENT
    pub tier_excellent: f64,
    /// Composite score floor for VERY_GOOD
    pub tier_very_good: f64,
    /// Composite score floor for GOOD
    pub tier_good: f64,
    /// Composite score floor for FAIR (below is POOR)
    pub tier_fair: f64,
    /// Sub-score above which an advantage string is emitted
    pub advantage_threshold: f64,
    /// Sub-score below which a risk factor is emitted
    pub risk_threshold: f64,
    /// Penalty subtracted from the composite when contradictory requirements are detected
    pub conflict_penalty: f64,
    /// Additive boost applied to urgent requests in real-time mode (per call, never learned)
    pub urgency_boost: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached match lists, in seconds
    pub ttl_seconds: u64,
    /// Maximum number of cached match lists before coarse eviction kicks in
    pub max_entries: usize,
}

/// Locations of optional persisted regression models.
///
/// A missing file is not an error: the affected predictor silently runs in
/// heuristic mode.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    pub success_model: String,
    pub cost_model: String,
    pub delivery_model: String,
}

impl ModelConfig {
    pub fn success_path(&self) -> PathBuf {
        self.model_dir.join(&self.success_model)
    }

    pub fn cost_path(&self) -> PathBuf {
        self.model_dir.join(&self.cost_model)
    }

    pub fn delivery_path(&self) -> PathBuf {
        self.model_dir.join(&self.delivery_model)
    }
}

/// Knobs for the heuristic fallback predictors.
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionConfig {
    /// Cost of one unit of nominal complexity, before any multiplier
    pub base_unit_cost: f64,
    /// Lead time for a nominal order, in days
    pub base_lead_days: f64,
    /// Deadlines closer than this count as rush orders
    pub rush_threshold_days: i64,
    /// Industry multipliers applied to the cost estimate
    pub aerospace_multiplier: f64,
    pub medical_multiplier: f64,
    pub automotive_multiplier: f64,
    pub consumer_multiplier: f64,
    /// Share of the estimate taken from the historical category average, when one exists
    pub history_blend: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LearningConfig {
    /// Step size for a single factor nudge
    pub nudge_rate: f64,
    /// Magnitude cap for the total per-factor delta in one apply_learning pass
    pub max_nudge: f64,
    /// Weights never drop below this before renormalization
    pub min_weight: f64,
    /// Ranks within this distance of the chosen candidate count as comparable
    pub rank_window: usize,
    /// Rolling window for the analytics score trend
    pub trend_window: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            tier_excellent: 0.85,
            tier_very_good: 0.70,
            tier_good: 0.55,
            tier_fair: 0.40,
            advantage_threshold: 0.80,
            risk_threshold: 0.45,
            conflict_penalty: 0.12,
            urgency_boost: 0.08,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_entries: 10_000,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            success_model: "success_regressor.onnx".to_string(),
            cost_model: "cost_regressor.onnx".to_string(),
            delivery_model: "delivery_regressor.onnx".to_string(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            base_unit_cost: 55.0,
            base_lead_days: 14.0,
            rush_threshold_days: 7,
            aerospace_multiplier: 2.5,
            medical_multiplier: 2.2,
            automotive_multiplier: 1.8,
            consumer_multiplier: 0.8,
            history_blend: 0.3,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            nudge_rate: 0.02,
            max_nudge: 0.05,
            min_weight: 0.01,
            rank_window: 2,
            trend_window: 100,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            models: ModelConfig::default(),
            prediction: PredictionConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let config = EngineConfig {
            scoring: ScoringConfig {
                tier_excellent: env_parse("TIER_EXCELLENT", 0.85),
                tier_very_good: env_parse("TIER_VERY_GOOD", 0.70),
                tier_good: env_parse("TIER_GOOD", 0.55),
                tier_fair: env_parse("TIER_FAIR", 0.40),
                advantage_threshold: env_parse("ADVANTAGE_THRESHOLD", 0.80),
                risk_threshold: env_parse("RISK_THRESHOLD", 0.45),
                conflict_penalty: env_parse("CONFLICT_PENALTY", 0.12),
                urgency_boost: env_parse("URGENCY_BOOST", 0.08),
            },
            cache: CacheConfig {
                ttl_seconds: env_parse("MATCH_CACHE_TTL_SECONDS", 300),
                max_entries: env_parse("MATCH_CACHE_MAX_ENTRIES", 10_000),
            },
            models: ModelConfig {
                model_dir: PathBuf::from(
                    env::var("MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
                ),
                success_model: env::var("SUCCESS_MODEL")
                    .unwrap_or_else(|_| "success_regressor.onnx".to_string()),
                cost_model: env::var("COST_MODEL")
                    .unwrap_or_else(|_| "cost_regressor.onnx".to_string()),
                delivery_model: env::var("DELIVERY_MODEL")
                    .unwrap_or_else(|_| "delivery_regressor.onnx".to_string()),
            },
            prediction: PredictionConfig {
                base_unit_cost: env_parse("BASE_UNIT_COST", 55.0),
                base_lead_days: env_parse("BASE_LEAD_DAYS", 14.0),
                rush_threshold_days: env_parse("RUSH_THRESHOLD_DAYS", 7),
                aerospace_multiplier: env_parse("AEROSPACE_MULTIPLIER", 2.5),
                medical_multiplier: env_parse("MEDICAL_MULTIPLIER", 2.2),
                automotive_multiplier: env_parse("AUTOMOTIVE_MULTIPLIER", 1.8),
                consumer_multiplier: env_parse("CONSUMER_MULTIPLIER", 0.8),
                history_blend: env_parse("COST_HISTORY_BLEND", 0.3),
            },
            learning: LearningConfig {
                nudge_rate: env_parse("NUDGE_RATE", 0.02),
                max_nudge: env_parse("MAX_NUDGE", 0.05),
                min_weight: env_parse("MIN_WEIGHT", 0.01),
                rank_window: env_parse("RANK_WINDOW", 2),
                trend_window: env_parse("TREND_WINDOW", 100),
            },
        };

        config.assert_valid();
        config
    }

    /// Tier bands must stay strictly ordered so the tier mapping is monotonic.
    fn assert_valid(&self) {
        let s = &self.scoring;
        assert!(
            s.tier_excellent > s.tier_very_good
                && s.tier_very_good > s.tier_good
                && s.tier_good > s.tier_fair
                && s.tier_fair > 0.0,
            "confidence tier thresholds must be strictly decreasing"
        );
        assert!(
            (0.0..1.0).contains(&self.prediction.history_blend),
            "COST_HISTORY_BLEND must be in [0, 1)"
        );
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{} must be a valid value: {:?}", key, e)),
        Err(_) => default,
    }
}
