/// Matching Orchestrator
///
/// Drives both matching directions over the shared scoring pipeline:
/// hard prefilter, feature extraction, prediction, scoring, deterministic
/// ranking, caching, and the feedback/analytics hooks exposed to
/// collaborators.
use crate::config::EngineConfig;
use crate::models::{CandidateProfile, ConfidenceTier, FeedbackEvent, Match, MatchRequest};
use crate::services::analytics::MatchAnalytics;
use crate::services::cache::{CacheKey, CacheStats, MatchCache};
use crate::services::features::FeatureExtractor;
use crate::services::feedback::FeedbackLearner;
use crate::services::prediction::PredictorSet;
use crate::services::scoring::{FactorWeights, ScoringEngine, WeightError, WeightStore};
use crate::utils::clamp_unit;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("Weight state error: {0}")]
    WeightState(#[from] WeightError),
}

pub type Result<T> = std::result::Result<T, MatchError>;

/// Per-call options for one matching run.
#[derive(Debug, Clone)]
pub struct MatchOptions {
    /// Maximum number of matches returned
    pub limit: usize,
    /// Real-time priority mode: boosts scores for this run without touching
    /// the learned weights
    pub urgent: bool,
    /// Matches scoring below this are dropped
    pub min_score: Option<f64>,
    /// Version marker for the candidate/request set backing this call;
    /// bump it when the underlying data refreshes
    pub set_version: u64,
    pub use_cache: bool,
    /// Customer segment whose weight override should apply, when one exists
    pub segment: Option<String>,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            urgent: false,
            min_score: None,
            set_version: 0,
            use_cache: true,
            segment: None,
        }
    }
}

pub struct MatchEngine {
    config: EngineConfig,
    extractor: FeatureExtractor,
    predictors: PredictorSet,
    scorer: ScoringEngine,
    weights: Arc<WeightStore>,
    cache: MatchCache,
    feedback: FeedbackLearner,
    analytics: MatchAnalytics,
}

impl MatchEngine {
    /// Build the engine, loading persisted predictor models once. Missing
    /// models degrade to heuristics and are logged, never an error.
    pub fn new(config: EngineConfig) -> Self {
        let predictors = PredictorSet::load(&config.models, &config.prediction);
        Self::with_predictors(config, predictors)
    }

    /// Build the engine around an explicit predictor set.
    pub fn with_predictors(config: EngineConfig, predictors: PredictorSet) -> Self {
        let weights = Arc::new(WeightStore::default());
        let engine = Self {
            extractor: FeatureExtractor::new(config.prediction.clone()),
            predictors,
            scorer: ScoringEngine::new(config.scoring.clone()),
            weights: weights.clone(),
            cache: MatchCache::new(
                Duration::from_secs(config.cache.ttl_seconds),
                config.cache.max_entries,
            ),
            feedback: FeedbackLearner::new(config.learning.clone(), weights),
            analytics: MatchAnalytics::new(config.learning.trend_window),
            config,
        };
        info!("Match engine initialized");
        engine
    }

    /// Rank candidates for one request, best first.
    ///
    /// An empty candidate set yields an empty list, not an error.
    pub async fn match_request(
        &self,
        request: &MatchRequest,
        candidates: &[CandidateProfile],
        options: &MatchOptions,
    ) -> Result<Vec<Match>> {
        let run_id = Uuid::new_v4();

        if candidates.is_empty() {
            debug!(run_id = %run_id, request_id = %request.id, "No candidates to score");
            return Ok(vec![]);
        }

        debug!(
            run_id = %run_id,
            request_id = %request.id,
            candidate_count = candidates.len(),
            urgent = options.urgent,
            "Matching request against candidates"
        );

        let matches = if options.use_cache {
            let key = self.cache_key("req", &request.id, options);
            self.cache
                .get_or_compute(key, || async {
                    self.compute_request_matches(request, candidates, options)
                })
                .await?
        } else {
            self.compute_request_matches(request, candidates, options)?
        };

        self.analytics.record_run(request, &matches, candidates);
        Ok(matches)
    }

    /// The dual direction: rank open requests for one candidate.
    pub async fn match_candidate(
        &self,
        candidate: &CandidateProfile,
        requests: &[MatchRequest],
        options: &MatchOptions,
    ) -> Result<Vec<Match>> {
        if requests.is_empty() {
            debug!(candidate_id = %candidate.id, "No requests to score");
            return Ok(vec![]);
        }

        if options.use_cache {
            let key = self.cache_key("cand", &candidate.id, options);
            self.cache
                .get_or_compute(key, || async {
                    self.compute_candidate_matches(candidate, requests, options)
                })
                .await
        } else {
            self.compute_candidate_matches(candidate, requests, options)
        }
    }

    /// Batch mode: each request is ranked independently against the same
    /// candidate set and weight snapshot.
    pub async fn match_batch(
        &self,
        requests: &[MatchRequest],
        candidates: &[CandidateProfile],
        options: &MatchOptions,
    ) -> Result<Vec<Vec<Match>>> {
        let runs = requests
            .iter()
            .map(|request| self.match_request(request, candidates, options));
        futures::future::join_all(runs)
            .await
            .into_iter()
            .collect()
    }

    /// Report which recommendation the requester acted on.
    pub async fn record_feedback(&self, event: FeedbackEvent) {
        self.feedback.record(event).await;
    }

    /// Fold buffered feedback into the factor weights.
    pub async fn apply_learning(&self) -> Result<Option<Arc<FactorWeights>>> {
        Ok(self.feedback.apply_learning().await?)
    }

    /// Immutable snapshot of the live global weights.
    pub fn weights_snapshot(&self) -> Arc<FactorWeights> {
        self.weights.snapshot()
    }

    pub fn analytics(&self) -> &MatchAnalytics {
        &self.analytics
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached rankings for one request or candidate.
    pub fn invalidate_cached(&self, subject_id: &str) {
        self.cache.invalidate_subject(&format!("req:{}", subject_id));
        self.cache.invalidate_subject(&format!("cand:{}", subject_id));
    }

    fn cache_key(&self, kind: &str, id: &str, options: &MatchOptions) -> CacheKey {
        CacheKey {
            subject_id: format!("{}:{}", kind, id),
            set_version: options.set_version,
            urgent: options.urgent,
            limit: options.limit,
        }
    }

    fn compute_request_matches(
        &self,
        request: &MatchRequest,
        candidates: &[CandidateProfile],
        options: &MatchOptions,
    ) -> Result<Vec<Match>> {
        let now = Utc::now();
        let weights = self.weights.snapshot_for(options.segment.as_deref());

        let mut scored: Vec<(Match, f64)> = candidates
            .iter()
            .filter(|candidate| passes_prefilter(request, candidate))
            .map(|candidate| {
                let m = self.score_pair(request, candidate, now, &weights, options);
                (m, candidate.rating_or_default())
            })
            .collect();

        let filtered_out = candidates.len() - scored.len();
        if filtered_out > 0 {
            debug!(
                request_id = %request.id,
                filtered_out,
                "Prefilter dropped candidates with no capability overlap"
            );
        }

        // Deterministic order: score, then candidate rating, then candidate id
        scored.sort_by(|(a, a_rating), (b, b_rating)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b_rating
                        .partial_cmp(a_rating)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(a.candidate_id.cmp(&b.candidate_id))
        });

        Ok(self.finalize(scored.into_iter().map(|(m, _)| m), options))
    }

    fn compute_candidate_matches(
        &self,
        candidate: &CandidateProfile,
        requests: &[MatchRequest],
        options: &MatchOptions,
    ) -> Result<Vec<Match>> {
        let now = Utc::now();
        let weights = self.weights.snapshot_for(options.segment.as_deref());

        let mut scored: Vec<Match> = requests
            .iter()
            .filter(|request| passes_prefilter(request, candidate))
            .map(|request| self.score_pair(request, candidate, now, &weights, options))
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.request_id.cmp(&b.request_id))
        });

        Ok(self.finalize(scored.into_iter(), options))
    }

    fn score_pair(
        &self,
        request: &MatchRequest,
        candidate: &CandidateProfile,
        now: DateTime<Utc>,
        weights: &FactorWeights,
        options: &MatchOptions,
    ) -> Match {
        let features = self.extractor.extract_at(request, candidate, now);
        let predictions = self
            .predictors
            .predict(&features, request.category.as_deref());
        let mut m = self
            .scorer
            .score(request, candidate, &features, &predictions, weights);

        // Real-time priority mode: a per-call boost, never learned
        if options.urgent {
            m.score = clamp_unit(m.score + self.config.scoring.urgency_boost);
            m.confidence = ConfidenceTier::from_score(m.score, &self.config.scoring);
        }

        m
    }

    fn finalize<I: Iterator<Item = Match>>(&self, matches: I, options: &MatchOptions) -> Vec<Match> {
        matches
            .filter(|m| options.min_score.map(|floor| m.score >= floor).unwrap_or(true))
            .take(options.limit)
            .collect()
    }
}

/// Hard constraint check ahead of scoring.
///
/// Only pairs with completely disjoint declared process sets are dropped;
/// anything that passes is scored exactly as it would have been without the
/// filter.
fn passes_prefilter(request: &MatchRequest, candidate: &CandidateProfile) -> bool {
    let required: Vec<String> = request
        .processes
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    let offered: Vec<String> = candidate
        .processes
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if required.is_empty() || offered.is_empty() {
        return true;
    }

    required.iter().any(|p| offered.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn engine() -> MatchEngine {
        let config = EngineConfig::default();
        let predictors = PredictorSet::heuristic(&config.prediction);
        MatchEngine::with_predictors(config, predictors)
    }

    fn request() -> MatchRequest {
        MatchRequest {
            id: "req-1".to_string(),
            processes: vec!["CNC Machining".to_string()],
            materials: vec!["Aluminum 6061".to_string()],
            quantity: Some(100),
            ..Default::default()
        }
    }

    fn candidate(id: &str, rating: f64) -> CandidateProfile {
        CandidateProfile {
            id: id.to_string(),
            processes: vec!["CNC Machining".to_string()],
            materials: vec!["Aluminum 6061".to_string()],
            rating: Some(rating),
            on_time_rate: Some(0.9),
            capacity_utilization: Some(0.5),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ranking_descends_by_score() {
        let engine = engine();
        let candidates = vec![
            candidate("mfg-low", 2.0),
            candidate("mfg-high", 4.8),
            candidate("mfg-mid", 3.5),
        ];

        let matches = engine
            .match_request(&request(), &candidates, &MatchOptions::default())
            .await
            .unwrap();

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].candidate_id, "mfg-high");
        assert!(matches[0].score >= matches[1].score);
        assert!(matches[1].score >= matches[2].score);
    }

    #[tokio::test]
    async fn test_tie_breaks_are_deterministic() {
        let engine = engine();
        // Identical profiles except id: equal scores, id decides
        let candidates = vec![candidate("mfg-b", 4.0), candidate("mfg-a", 4.0)];

        let matches = engine
            .match_request(&request(), &candidates, &MatchOptions::default())
            .await
            .unwrap();

        assert_eq!(matches[0].candidate_id, "mfg-a");
        assert_eq!(matches[1].candidate_id, "mfg-b");
    }

    #[tokio::test]
    async fn test_prefilter_drops_disjoint_processes() {
        let engine = engine();
        let mut welding_only = candidate("mfg-welding", 5.0);
        welding_only.processes = vec!["Welding".to_string()];
        let candidates = vec![candidate("mfg-cnc", 3.0), welding_only];

        let matches = engine
            .match_request(&request(), &candidates, &MatchOptions::default())
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].candidate_id, "mfg-cnc");
    }

    #[tokio::test]
    async fn test_empty_candidate_set_is_not_an_error() {
        let engine = engine();
        let matches = engine
            .match_request(&request(), &[], &MatchOptions::default())
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_urgency_boost_is_per_call() {
        let engine = engine();
        let candidates = vec![candidate("mfg-1", 4.0)];

        let options = MatchOptions {
            use_cache: false,
            ..Default::default()
        };
        let normal = engine
            .match_request(&request(), &candidates, &options)
            .await
            .unwrap();

        let urgent_options = MatchOptions {
            urgent: true,
            use_cache: false,
            ..Default::default()
        };
        let urgent = engine
            .match_request(&request(), &candidates, &urgent_options)
            .await
            .unwrap();

        let boost = engine.config.scoring.urgency_boost;
        assert!((urgent[0].score - (normal[0].score + boost).min(1.0)).abs() < 1e-9);
        // The learned weights are untouched by the boost
        assert_eq!(engine.weights_snapshot().version, 1);
    }

    #[tokio::test]
    async fn test_candidate_direction_ranks_requests() {
        let engine = engine();
        let mut tight_budget = request();
        tight_budget.id = "req-tight".to_string();
        tight_budget.budget_max = Some(50.0);

        let mut roomy = request();
        roomy.id = "req-roomy".to_string();
        roomy.budget_max = Some(1_000_000.0);

        let matches = engine
            .match_candidate(
                &candidate("mfg-1", 4.0),
                &[tight_budget, roomy],
                &MatchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].request_id, "req-roomy");
        assert_eq!(matches[0].candidate_id, "mfg-1");
    }

    #[tokio::test]
    async fn test_batch_processes_each_request() {
        let engine = engine();
        let mut other = request();
        other.id = "req-2".to_string();

        let results = engine
            .match_batch(
                &[request(), other],
                &[candidate("mfg-1", 4.0)],
                &MatchOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0][0].request_id, "req-1");
        assert_eq!(results[1][0].request_id, "req-2");
    }

    #[tokio::test]
    async fn test_min_score_floor() {
        let engine = engine();
        let candidates = vec![candidate("mfg-1", 4.0)];
        let options = MatchOptions {
            min_score: Some(0.999),
            use_cache: false,
            ..Default::default()
        };

        let matches = engine
            .match_request(&request(), &candidates, &options)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_invalidation() {
        let engine = engine();
        let candidates = vec![candidate("mfg-1", 4.0)];
        let options = MatchOptions::default();

        let first = engine
            .match_request(&request(), &candidates, &options)
            .await
            .unwrap();
        let second = engine
            .match_request(&request(), &candidates, &options)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.cache_stats().hit_count, 1);

        engine.invalidate_cached("req-1");
        assert_eq!(engine.cache_stats().entries, 0);
    }
}
