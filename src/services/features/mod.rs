// ============================================
// Feature Extractor
// ============================================
//
// Converts one (request, candidate) pair into a fixed-length numeric
// feature vector. Input records may be incomplete or malformed; everything
// is defaulted and clamped here so the predictors and the scoring engine
// operate on bounded values only.

use crate::config::PredictionConfig;
use crate::models::{CandidateProfile, MatchRequest};
use crate::utils::coverage_ratio;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

/// Feature vector size consumed by the regression models.
/// Layout must stay in sync with `FeatureVector::to_array`.
pub const FEATURE_VECTOR_SIZE: usize = 16;

/// Materials that carry a sourcing premium and longer procurement.
static SPECIALTY_MATERIALS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "titanium",
        "inconel",
        "carbon fiber",
        "peek",
        "magnesium",
        "hastelloy",
        "tungsten",
    ]
});

/// Neutral deadline slack assumed when the request has no deadline, in days.
const DEFAULT_SLACK_DAYS: f32 = 30.0;

/// Derived, ephemeral signals for one (request, candidate) pair.
///
/// Never persisted; recomputed per match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureVector {
    /// Share of required processes the candidate supports, [0, 1]
    pub process_overlap: f32,
    /// Share of required materials the candidate works with, [0, 1]
    pub material_overlap: f32,
    /// Share of required certifications the candidate holds, [0, 1]
    pub certification_coverage: f32,
    /// Candidate rating scaled to [0, 1]
    pub rating_norm: f32,
    /// On-time delivery rate, [0, 1]
    pub on_time_rate: f32,
    /// Completed order count, raw
    pub completed_orders: f32,
    /// Years in business, raw
    pub years_in_business: f32,
    /// Current capacity utilization, [0, 1]
    pub capacity_utilization: f32,
    /// 1.0 same location, 0.5 unknown, 0.0 mismatch
    pub location_match: f32,
    /// Requested quantity, raw units
    pub quantity: f32,
    /// Number of structured technical requirements, raw
    pub requirement_complexity: f32,
    /// Share of requested materials that are specialty, [0, 1]
    pub specialty_material_share: f32,
    /// Industry cost multiplier resolved from the request category
    pub industry_cost_factor: f32,
    /// 1.0 when the deadline is inside the rush threshold
    pub is_rush: f32,
    /// Days between now and the deadline (neutral default when absent)
    pub deadline_slack_days: f32,
    /// Number of certifications the request demands, raw
    pub required_certifications: f32,
}

impl FeatureVector {
    /// Fixed layout consumed by the ONNX regressors.
    pub fn to_array(&self) -> [f32; FEATURE_VECTOR_SIZE] {
        [
            self.process_overlap,
            self.material_overlap,
            self.certification_coverage,
            self.rating_norm,
            self.on_time_rate,
            self.completed_orders,
            self.years_in_business,
            self.capacity_utilization,
            self.location_match,
            self.quantity,
            self.requirement_complexity,
            self.specialty_material_share,
            self.industry_cost_factor,
            self.is_rush,
            self.deadline_slack_days,
            self.required_certifications,
        ]
    }
}

/// Stateless extractor; pure in its inputs plus static configuration.
pub struct FeatureExtractor {
    config: PredictionConfig,
}

impl FeatureExtractor {
    pub fn new(config: PredictionConfig) -> Self {
        Self { config }
    }

    /// Extract features using the current wall clock as reference time.
    pub fn extract(&self, request: &MatchRequest, candidate: &CandidateProfile) -> FeatureVector {
        self.extract_at(request, candidate, Utc::now())
    }

    /// Extract features against an explicit reference time.
    ///
    /// Deterministic: the same (request, candidate, now) triple always yields
    /// the same vector.
    pub fn extract_at(
        &self,
        request: &MatchRequest,
        candidate: &CandidateProfile,
        now: DateTime<Utc>,
    ) -> FeatureVector {
        let required_processes = clean(&request.processes);
        let offered_processes = clean(&candidate.processes);
        let required_materials = clean(&request.materials);
        let offered_materials = clean(&candidate.materials);
        let required_certs = clean(&request.certifications);
        let held_certs = clean(&candidate.certifications);

        let slack_days = request
            .days_until_deadline(now)
            .map(|d| d as f32)
            .unwrap_or(DEFAULT_SLACK_DAYS);
        let is_rush = request
            .days_until_deadline(now)
            .map(|d| d <= self.config.rush_threshold_days)
            .unwrap_or(false);

        FeatureVector {
            process_overlap: coverage_ratio(&required_processes, &offered_processes) as f32,
            material_overlap: coverage_ratio(&required_materials, &offered_materials) as f32,
            certification_coverage: coverage_ratio(&required_certs, &held_certs) as f32,
            rating_norm: (candidate.rating_or_default() / 5.0) as f32,
            on_time_rate: candidate.on_time_rate_norm() as f32,
            completed_orders: candidate.completed_orders_count() as f32,
            years_in_business: candidate.years_in_business_or_default() as f32,
            capacity_utilization: candidate.capacity_utilization_norm() as f32,
            location_match: location_match(
                request.location.as_deref(),
                candidate.location.as_deref(),
            ),
            quantity: request.quantity_or_default() as f32,
            requirement_complexity: clean(&request.technical_requirements).len() as f32,
            specialty_material_share: specialty_share(&required_materials),
            industry_cost_factor: self.industry_factor(request.category.as_deref()),
            is_rush: if is_rush { 1.0 } else { 0.0 },
            deadline_slack_days: slack_days,
            required_certifications: required_certs.len() as f32,
        }
    }

    /// Resolve the cost multiplier for the request's industry.
    pub fn industry_factor(&self, category: Option<&str>) -> f32 {
        let Some(category) = category else {
            return 1.0;
        };
        let category = category.to_lowercase();

        let factor = if category.contains("aerospace") || category.contains("aviation") {
            self.config.aerospace_multiplier
        } else if category.contains("medical") || category.contains("health") {
            self.config.medical_multiplier
        } else if category.contains("automotive") || category.contains("auto") {
            self.config.automotive_multiplier
        } else if category.contains("consumer") || category.contains("retail") {
            self.config.consumer_multiplier
        } else {
            1.0
        };

        factor as f32
    }
}

fn clean(entries: &[String]) -> Vec<String> {
    entries
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn location_match(requested: Option<&str>, offered: Option<&str>) -> f32 {
    match (requested, offered) {
        (Some(a), Some(b)) => {
            if a.eq_ignore_ascii_case(b) {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.5,
    }
}

fn specialty_share(materials: &[String]) -> f32 {
    if materials.is_empty() {
        return 0.0;
    }
    let specialty = materials
        .iter()
        .filter(|m| {
            let lower = m.to_lowercase();
            SPECIALTY_MATERIALS.iter().any(|s| lower.contains(s))
        })
        .count();
    specialty as f32 / materials.len() as f32
}
