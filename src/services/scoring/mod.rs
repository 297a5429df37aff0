/// Scoring Module
///
/// Combines feature signals and predictor estimates into a ranked Match:
/// eight factor sub-scores, a weighted composite, a confidence tier, and
/// human-readable reasoning. Weights come from the feedback-adjusted
/// snapshot the caller passes in, so one matching run scores every pair
/// against the same weight set.
pub mod weights;

pub use weights::{FactorWeights, WeightError, WeightStore, WEIGHT_SUM_TOLERANCE};

use crate::config::ScoringConfig;
use crate::models::{
    CandidateProfile, ConfidenceTier, FactorScores, Match, MatchRequest,
};
use crate::services::features::FeatureVector;
use crate::services::prediction::Predictions;
use crate::utils::clamp_unit;
use tracing::debug;

/// Keywords that signal a demand for top-end quality.
const QUALITY_EXTREMES: [&str; 5] = ["highest", "premium", "maximum", "best", "top"];

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score one (request, candidate) pair against a weight snapshot.
    ///
    /// Deterministic: identical inputs and snapshot always produce an
    /// identical Match.
    pub fn score(
        &self,
        request: &MatchRequest,
        candidate: &CandidateProfile,
        features: &FeatureVector,
        predictions: &Predictions,
        weights: &FactorWeights,
    ) -> Match {
        let breakdown = self.sub_scores(request, features, predictions);

        let mut composite = clamp_unit(weights.weighted_sum(&breakdown));

        let mut risk_factors = Vec::new();
        let mut advantages = Vec::new();

        if self.has_conflicting_requirements(request, predictions) {
            composite = clamp_unit(composite - self.config.conflict_penalty);
            risk_factors.push(
                "Conflicting requirements: top-end quality demanded within an unrealistic budget ceiling"
                    .to_string(),
            );
        }

        self.collect_reasoning(
            request,
            candidate,
            features,
            &breakdown,
            &mut advantages,
            &mut risk_factors,
        );

        let confidence = ConfidenceTier::from_score(composite, &self.config);

        debug!(
            request_id = %request.id,
            candidate_id = %candidate.id,
            score = composite,
            tier = confidence.as_str(),
            "Scored pair"
        );

        Match {
            request_id: request.id.clone(),
            candidate_id: candidate.id.clone(),
            score: composite,
            confidence,
            breakdown,
            predicted_cost: predictions.cost,
            predicted_delivery_days: predictions.delivery_days,
            success_probability: predictions.success_probability,
            risk_factors,
            advantages,
        }
    }

    fn sub_scores(
        &self,
        request: &MatchRequest,
        features: &FeatureVector,
        predictions: &Predictions,
    ) -> FactorScores {
        FactorScores {
            process_match: clamp_unit(features.process_overlap as f64),
            cost_compatibility: cost_compatibility(request.budget_max, predictions.cost),
            timeline: timeline_compatibility(features, predictions),
            geographic: clamp_unit(0.4 + 0.6 * features.location_match as f64),
            capacity: clamp_unit(1.0 - features.capacity_utilization as f64),
            quality: clamp_unit(
                0.7 * features.rating_norm as f64 + 0.3 * features.on_time_rate as f64,
            ),
            urgency_alignment: urgency_alignment(features),
            technical_spec: clamp_unit(
                0.5 * features.certification_coverage as f64
                    + 0.3 * features.material_overlap as f64
                    + 0.2 * features.process_overlap as f64,
            ),
        }
    }

    /// Both extremes present at once: premium quality language and a budget
    /// ceiling far below the predicted cost. Scored and flagged, never
    /// rejected.
    fn has_conflicting_requirements(
        &self,
        request: &MatchRequest,
        predictions: &Predictions,
    ) -> bool {
        let wants_premium = request
            .quality_level
            .iter()
            .chain(request.technical_requirements.iter())
            .any(|text| {
                let lower = text.to_lowercase();
                QUALITY_EXTREMES.iter().any(|k| lower.contains(k))
            });

        let budget_unrealistic = request
            .budget_max
            .map(|max| max > 0.0 && max < predictions.cost * 0.5)
            .unwrap_or(false);

        wants_premium && budget_unrealistic
    }

    fn collect_reasoning(
        &self,
        request: &MatchRequest,
        candidate: &CandidateProfile,
        features: &FeatureVector,
        breakdown: &FactorScores,
        advantages: &mut Vec<String>,
        risk_factors: &mut Vec<String>,
    ) {
        let adv = self.config.advantage_threshold;
        let risk = self.config.risk_threshold;

        if breakdown.quality >= adv {
            advantages.push("Highly rated manufacturer with a strong delivery record".to_string());
        }
        if !request.processes.is_empty() && features.process_overlap >= 1.0 {
            advantages.push("Covers every requested manufacturing process".to_string());
        }
        if breakdown.cost_compatibility >= adv && request.budget_max.is_some() {
            advantages.push("Predicted cost fits comfortably within budget".to_string());
        }
        if breakdown.timeline >= adv && request.deadline.is_some() {
            advantages.push("Comfortable schedule margin against the deadline".to_string());
        }
        if features.location_match >= 1.0 {
            advantages.push("Located in the requested region".to_string());
        }

        if breakdown.cost_compatibility < risk {
            risk_factors.push("Predicted cost strains the stated budget".to_string());
        }
        if breakdown.timeline < risk {
            risk_factors.push("Predicted lead time threatens the deadline".to_string());
        }
        if breakdown.quality < risk {
            risk_factors.push("Below-average rating or delivery record".to_string());
        }
        if breakdown.capacity < risk {
            risk_factors.push("Little spare capacity at this manufacturer".to_string());
        }
        if features.process_overlap < 1.0 && !request.processes.is_empty() {
            risk_factors.push("Does not cover all requested processes".to_string());
        }

        let missing = missing_certifications(request, candidate);
        if !missing.is_empty() {
            risk_factors.push(format!(
                "Missing required certification(s): {}",
                missing.join(", ")
            ));
        }
    }
}

fn cost_compatibility(budget_max: Option<f64>, predicted_cost: f64) -> f64 {
    match budget_max {
        Some(max) if max > 0.0 => {
            let ratio = predicted_cost / max;
            if ratio <= 1.0 {
                // Within budget: the more headroom the better
                clamp_unit(1.0 - 0.2 * ratio)
            } else {
                clamp_unit(0.8 / ratio)
            }
        }
        // No budget stated: neutral
        _ => 0.75,
    }
}

fn timeline_compatibility(features: &FeatureVector, predictions: &Predictions) -> f64 {
    let slack = (features.deadline_slack_days as f64).max(1.0);
    let ratio = predictions.delivery_days / slack;
    if ratio <= 1.0 {
        clamp_unit(0.6 + 0.4 * (1.0 - ratio))
    } else {
        clamp_unit(0.6 - 0.6 * (ratio - 1.0))
    }
}

fn urgency_alignment(features: &FeatureVector) -> f64 {
    if features.is_rush > 0.5 {
        clamp_unit(
            0.5 * (1.0 - features.capacity_utilization as f64) + 0.5 * features.on_time_rate as f64,
        )
    } else {
        0.8
    }
}

fn missing_certifications(request: &MatchRequest, candidate: &CandidateProfile) -> Vec<String> {
    request
        .certifications
        .iter()
        .filter(|c| !c.trim().is_empty())
        .filter(|required| {
            !candidate
                .certifications
                .iter()
                .any(|held| held.eq_ignore_ascii_case(required))
        })
        .cloned()
        .collect()
}
