// Read-only run summaries for the reporting layer.
//
// The engine records one summary line per matching run; everything exposed
// here is an aggregate over those summaries. Nothing in this module feeds
// back into scoring.

use crate::models::{CandidateProfile, Match, MatchRequest};
use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const UNKNOWN_BUCKET: &str = "unknown";

pub struct MatchAnalytics {
    category_counts: DashMap<String, u64>,
    location_counts: DashMap<String, u64>,
    /// Rolling window of top-match composite scores
    score_window: Mutex<VecDeque<f64>>,
    window_size: usize,
    runs: AtomicU64,
}

impl MatchAnalytics {
    pub fn new(window_size: usize) -> Self {
        Self {
            category_counts: DashMap::new(),
            location_counts: DashMap::new(),
            score_window: Mutex::new(VecDeque::with_capacity(window_size)),
            window_size: window_size.max(1),
            runs: AtomicU64::new(0),
        }
    }

    /// Record the outcome of one matching run.
    pub fn record_run(
        &self,
        request: &MatchRequest,
        matches: &[Match],
        candidates: &[CandidateProfile],
    ) {
        self.runs.fetch_add(1, Ordering::Relaxed);

        let category = request
            .category
            .clone()
            .unwrap_or_else(|| UNKNOWN_BUCKET.to_string())
            .to_lowercase();
        *self.category_counts.entry(category).or_insert(0) += 1;

        if let Some(top) = matches.first() {
            let location = candidates
                .iter()
                .find(|c| c.id == top.candidate_id)
                .and_then(|c| c.location.clone())
                .unwrap_or_else(|| UNKNOWN_BUCKET.to_string())
                .to_lowercase();
            *self.location_counts.entry(location).or_insert(0) += 1;

            let mut window = self.score_window.lock().expect("analytics lock poisoned");
            if window.len() == self.window_size {
                window.pop_front();
            }
            window.push_back(top.score);
        }
    }

    /// How often each request category produced a matching run.
    pub fn category_distribution(&self) -> HashMap<String, u64> {
        self.category_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Where the winning candidates are located.
    pub fn geographic_distribution(&self) -> HashMap<String, u64> {
        self.location_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Rolling average of top-match scores; None before any run produced a
    /// match.
    pub fn average_top_score(&self) -> Option<f64> {
        let window = self.score_window.lock().expect("analytics lock poisoned");
        if window.is_empty() {
            None
        } else {
            Some(window.iter().sum::<f64>() / window.len() as f64)
        }
    }

    pub fn run_count(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfidenceTier, FactorScores};

    fn request(category: &str) -> MatchRequest {
        MatchRequest {
            id: "req-1".to_string(),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn top_match(candidate_id: &str, score: f64) -> Match {
        Match {
            request_id: "req-1".to_string(),
            candidate_id: candidate_id.to_string(),
            score,
            confidence: ConfidenceTier::Good,
            breakdown: FactorScores::default(),
            predicted_cost: 500.0,
            predicted_delivery_days: 10.0,
            success_probability: 0.8,
            risk_factors: vec![],
            advantages: vec![],
        }
    }

    fn candidate(id: &str, location: &str) -> CandidateProfile {
        CandidateProfile {
            id: id.to_string(),
            location: Some(location.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_distributions_reflect_runs() {
        let analytics = MatchAnalytics::new(10);
        let candidates = vec![candidate("mfg-1", "Austin, TX")];

        analytics.record_run(&request("Aerospace"), &[top_match("mfg-1", 0.8)], &candidates);
        analytics.record_run(&request("aerospace"), &[top_match("mfg-1", 0.6)], &candidates);
        analytics.record_run(&request("Medical"), &[], &candidates);

        let categories = analytics.category_distribution();
        assert_eq!(categories.get("aerospace"), Some(&2));
        assert_eq!(categories.get("medical"), Some(&1));

        let locations = analytics.geographic_distribution();
        assert_eq!(locations.get("austin, tx"), Some(&2));

        assert_eq!(analytics.run_count(), 3);
        assert!((analytics.average_top_score().unwrap() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_window_is_bounded() {
        let analytics = MatchAnalytics::new(2);
        let candidates = vec![candidate("mfg-1", "Reno, NV")];

        for score in [0.2, 0.4, 0.9] {
            analytics.record_run(&request("General"), &[top_match("mfg-1", score)], &candidates);
        }

        // Only the two most recent scores remain in the window
        assert!((analytics.average_top_score().unwrap() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_empty_state() {
        let analytics = MatchAnalytics::new(5);
        assert!(analytics.average_top_score().is_none());
        assert!(analytics.category_distribution().is_empty());
    }
}
