// ============================================
// Feedback Learning Engine
// ============================================
//
// Records which recommended candidate a requester ultimately chose and
// nudges the factor weights toward the dimensions that separated chosen
// candidates from spurned ones at similar ranks. Online and incremental:
// this never retrains the predictors, it only re-balances the scoring
// weights.

use crate::config::LearningConfig;
use crate::models::{Factor, FeedbackEvent};
use crate::services::scoring::{FactorWeights, WeightError, WeightStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct FeedbackLearner {
    config: LearningConfig,
    weights: Arc<WeightStore>,
    pending: Mutex<Vec<FeedbackEvent>>,
}

impl FeedbackLearner {
    pub fn new(config: LearningConfig, weights: Arc<WeightStore>) -> Self {
        Self {
            config,
            weights,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Buffer one outcome report for the next learning pass.
    pub async fn record(&self, event: FeedbackEvent) {
        debug!(
            request_id = %event.request_id,
            candidate_id = %event.candidate_id,
            rank = event.rank,
            chosen = event.chosen,
            "Recorded feedback event"
        );
        self.pending.lock().await.push(event);
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Drain buffered events and publish adjusted weight snapshots.
    ///
    /// Returns the new global snapshot, or None when there was nothing to
    /// learn from. A snapshot that fails to renormalize is rejected by the
    /// store (the last good snapshot stays live) and surfaces as an error.
    pub async fn apply_learning(&self) -> Result<Option<Arc<FactorWeights>>, WeightError> {
        let events: Vec<FeedbackEvent> = {
            let mut pending = self.pending.lock().await;
            pending.drain(..).collect()
        };

        if events.is_empty() {
            return Ok(None);
        }

        let snapshot = self.weights.snapshot();
        let deltas = self.factor_deltas(&events);
        let raw = nudged_raw(&snapshot, &deltas, &self.config);
        let published = self.weights.publish(raw)?;

        info!(
            events = events.len(),
            version = published.version,
            "Applied feedback learning to global weights"
        );

        // Per-segment overrides learn only from their own events, layered on
        // the segment's current snapshot.
        let mut by_segment: HashMap<String, Vec<FeedbackEvent>> = HashMap::new();
        for event in events {
            if let Some(segment) = event.segment.clone() {
                by_segment.entry(segment.to_lowercase()).or_default().push(event);
            }
        }
        for (segment, segment_events) in by_segment {
            let base = self.weights.snapshot_for(Some(&segment));
            let deltas = self.factor_deltas(&segment_events);
            let raw = nudged_raw(&base, &deltas, &self.config);
            self.weights.publish_segment(&segment, raw)?;
        }

        Ok(Some(published))
    }

    /// Per-factor adjustment derived from chosen-vs-spurned contrast.
    ///
    /// For every chosen candidate, factors where its breakdown beat the
    /// average of non-chosen candidates at comparable ranks are pushed up in
    /// proportion to the reward; factors where it trailed are pushed down.
    /// A negative reward (rejected choice) flips the push.
    fn factor_deltas(&self, events: &[FeedbackEvent]) -> HashMap<Factor, f64> {
        let mut deltas: HashMap<Factor, f64> =
            Factor::ALL.iter().map(|f| (*f, 0.0)).collect();

        let mut by_request: HashMap<&str, Vec<&FeedbackEvent>> = HashMap::new();
        for event in events {
            by_request.entry(event.request_id.as_str()).or_default().push(event);
        }

        for group in by_request.values() {
            let Some(chosen) = group.iter().find(|e| e.chosen) else {
                continue;
            };
            let reward = chosen.outcome.reward();

            let comparables: Vec<&&FeedbackEvent> = group
                .iter()
                .filter(|e| {
                    !e.chosen
                        && e.rank.abs_diff(chosen.rank) <= self.config.rank_window
                })
                .collect();

            for factor in Factor::ALL {
                let chosen_score = chosen.breakdown.get(factor);
                let contrast = if comparables.is_empty() {
                    // No peers to compare against: center on the neutral midpoint
                    chosen_score - 0.5
                } else {
                    let peer_avg: f64 = comparables
                        .iter()
                        .map(|e| e.breakdown.get(factor))
                        .sum::<f64>()
                        / comparables.len() as f64;
                    chosen_score - peer_avg
                };

                *deltas.get_mut(&factor).expect("all factors present") +=
                    self.config.nudge_rate * reward * contrast;
            }
        }

        deltas
    }
}

/// Apply bounded deltas to a snapshot, producing the raw values for the next
/// publish. Every nudge is capped and no weight drops below the floor.
fn nudged_raw(
    snapshot: &FactorWeights,
    deltas: &HashMap<Factor, f64>,
    config: &LearningConfig,
) -> HashMap<Factor, f64> {
    Factor::ALL
        .iter()
        .map(|factor| {
            let delta = deltas
                .get(factor)
                .copied()
                .unwrap_or(0.0)
                .clamp(-config.max_nudge, config.max_nudge);
            let next = (snapshot.get(*factor) + delta).max(config.min_weight);
            (*factor, next)
        })
        .collect()
}
