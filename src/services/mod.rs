pub mod analytics;
pub mod cache;
pub mod features;
pub mod feedback;
pub mod matching;
pub mod prediction;
pub mod scoring;

pub use analytics::MatchAnalytics;
pub use cache::{CacheKey, CacheStats, MatchCache};
pub use features::{FeatureExtractor, FeatureVector};
pub use feedback::FeedbackLearner;
pub use matching::{MatchEngine, MatchError, MatchOptions};
pub use prediction::{Predictions, PredictorSet};
pub use scoring::{FactorWeights, ScoringEngine, WeightError, WeightStore};
