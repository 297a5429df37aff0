pub mod config;
pub mod models;
pub mod services;
pub mod utils;

pub use config::EngineConfig;
pub use models::{
    CandidateProfile, ConfidenceTier, Factor, FactorScores, FeedbackEvent, FeedbackOutcome, Match,
    MatchRequest,
};
pub use services::{
    FactorWeights, FeatureExtractor, FeatureVector, FeedbackLearner, MatchAnalytics, MatchCache,
    MatchEngine, MatchError, MatchOptions, Predictions, PredictorSet, ScoringEngine, WeightStore,
};
