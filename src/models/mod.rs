pub mod de;

use crate::config::ScoringConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A manufacturing need supplied by the order-management collaborator.
///
/// Immutable once a matching run begins. Fields tolerate the payload quirks
/// the collaborator is known for: scalars where lists belong, numbers as
/// strings, and missing values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub processes: Vec<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub certifications: Vec<String>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub quantity: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub budget_min: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub budget_max: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_datetime")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub quality_level: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub technical_requirements: Vec<String>,
}

impl MatchRequest {
    /// Quantity clamped to a sane order size; absent or negative becomes one.
    pub fn quantity_or_default(&self) -> i64 {
        self.quantity.unwrap_or(1).max(1)
    }

    /// Days between `now` and the deadline; None when no deadline was given.
    pub fn days_until_deadline(&self, now: DateTime<Utc>) -> Option<i64> {
        self.deadline.map(|d| (d - now).num_days())
    }
}

/// A manufacturer profile or standing production offer.
///
/// Supplied by the manufacturer-profile collaborator and frequently
/// incomplete; the accessor methods resolve missing and out-of-range values
/// to documented neutral defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub processes: Vec<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "de::string_or_seq")]
    pub certifications: Vec<String>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub rating: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_i64")]
    pub completed_orders: Option<i64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub on_time_rate: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub years_in_business: Option<f64>,
    #[serde(default, deserialize_with = "de::lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "de::lenient_f64")]
    pub capacity_utilization: Option<f64>,
}

impl CandidateProfile {
    /// Overall rating on the 0-5 scale; absent → 3.0, out of range → clamped.
    pub fn rating_or_default(&self) -> f64 {
        self.rating.unwrap_or(3.0).clamp(0.0, 5.0)
    }

    /// On-time delivery rate normalized to [0, 1]; absent → 0.8.
    /// Values above 1 are taken as percentages.
    pub fn on_time_rate_norm(&self) -> f64 {
        let raw = self.on_time_rate.unwrap_or(0.8);
        let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
        scaled.clamp(0.0, 1.0)
    }

    /// Current utilization in [0, 1]; absent → 0.5.
    pub fn capacity_utilization_norm(&self) -> f64 {
        let raw = self.capacity_utilization.unwrap_or(0.5);
        let scaled = if raw > 1.0 { raw / 100.0 } else { raw };
        scaled.clamp(0.0, 1.0)
    }

    /// Completed order count; negative reports become zero.
    pub fn completed_orders_count(&self) -> i64 {
        self.completed_orders.unwrap_or(0).max(0)
    }

    pub fn years_in_business_or_default(&self) -> f64 {
        self.years_in_business.unwrap_or(0.0).max(0.0)
    }
}

/// The eight scoring dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Factor {
    ProcessMatch,
    CostCompatibility,
    Timeline,
    Geographic,
    Capacity,
    Quality,
    UrgencyAlignment,
    TechnicalSpec,
}

impl Factor {
    pub const ALL: [Factor; 8] = [
        Factor::ProcessMatch,
        Factor::CostCompatibility,
        Factor::Timeline,
        Factor::Geographic,
        Factor::Capacity,
        Factor::Quality,
        Factor::UrgencyAlignment,
        Factor::TechnicalSpec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::ProcessMatch => "process_match",
            Factor::CostCompatibility => "cost_compatibility",
            Factor::Timeline => "timeline",
            Factor::Geographic => "geographic",
            Factor::Capacity => "capacity",
            Factor::Quality => "quality",
            Factor::UrgencyAlignment => "urgency_alignment",
            Factor::TechnicalSpec => "technical_spec",
        }
    }
}

/// Per-factor sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub process_match: f64,
    pub cost_compatibility: f64,
    pub timeline: f64,
    pub geographic: f64,
    pub capacity: f64,
    pub quality: f64,
    pub urgency_alignment: f64,
    pub technical_spec: f64,
}

impl FactorScores {
    pub fn get(&self, factor: Factor) -> f64 {
        match factor {
            Factor::ProcessMatch => self.process_match,
            Factor::CostCompatibility => self.cost_compatibility,
            Factor::Timeline => self.timeline,
            Factor::Geographic => self.geographic,
            Factor::Capacity => self.capacity,
            Factor::Quality => self.quality,
            Factor::UrgencyAlignment => self.urgency_alignment,
            Factor::TechnicalSpec => self.technical_spec,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Factor, f64)> + '_ {
        Factor::ALL.iter().map(move |f| (*f, self.get(*f)))
    }
}

/// Discrete confidence label derived from the composite score.
///
/// Variants are ordered so that a higher composite score never maps to a
/// lower tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl ConfidenceTier {
    pub fn from_score(score: f64, config: &ScoringConfig) -> Self {
        if score >= config.tier_excellent {
            ConfidenceTier::Excellent
        } else if score >= config.tier_very_good {
            ConfidenceTier::VeryGood
        } else if score >= config.tier_good {
            ConfidenceTier::Good
        } else if score >= config.tier_fair {
            ConfidenceTier::Fair
        } else {
            ConfidenceTier::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::Excellent => "EXCELLENT",
            ConfidenceTier::VeryGood => "VERY_GOOD",
            ConfidenceTier::Good => "GOOD",
            ConfidenceTier::Fair => "FAIR",
            ConfidenceTier::Poor => "POOR",
        }
    }
}

/// Scored pairing of one request and one candidate.
///
/// Fully reconstructable from the (request, candidate) pair plus model state;
/// the engine never persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub request_id: String,
    pub candidate_id: String,
    pub score: f64,
    pub confidence: ConfidenceTier,
    pub breakdown: FactorScores,
    pub predicted_cost: f64,
    pub predicted_delivery_days: f64,
    pub success_probability: f64,
    pub risk_factors: Vec<String>,
    pub advantages: Vec<String>,
}

/// Business outcome reported for a recommended candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackOutcome {
    ShownOnly,
    Contacted,
    QuoteAccepted,
    Rejected,
}

impl FeedbackOutcome {
    /// Implicit reward used by the learning step.
    pub fn reward(&self) -> f64 {
        match self {
            FeedbackOutcome::QuoteAccepted => 1.0,
            FeedbackOutcome::Contacted => 0.6,
            FeedbackOutcome::ShownOnly => 0.1,
            FeedbackOutcome::Rejected => -0.4,
        }
    }
}

/// Outcome report for one recommended candidate. Pure data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub request_id: String,
    pub candidate_id: String,
    /// Position the candidate held in the presented ranking (0 = top).
    pub rank: usize,
    /// Whether the requester ultimately went with this candidate.
    pub chosen: bool,
    pub outcome: FeedbackOutcome,
    /// The factor breakdown that produced the presented Match.
    pub breakdown: FactorScores,
    /// Inferred customer segment, when known (e.g. industry).
    pub segment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
