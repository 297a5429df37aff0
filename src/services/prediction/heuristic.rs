// Heuristic fallback estimators.
//
// Used whenever no trained regression model is available for a target.
// Every formula is deterministic and bounded; the knobs live in
// `PredictionConfig`.

use crate::config::PredictionConfig;
use crate::services::features::FeatureVector;
use crate::utils::clamp_unit;

/// Blend of candidate track record, capability fit, and alignment, in [0, 1].
pub fn success_probability(features: &FeatureVector) -> f64 {
    let capability = 0.5 * features.process_overlap as f64
        + 0.3 * features.material_overlap as f64
        + 0.2 * features.certification_coverage as f64;

    // Urgent work favors candidates with spare capacity and a reliable
    // delivery record; without urgency the term is neutral.
    let urgency_readiness = if features.is_rush > 0.5 {
        (1.0 - features.capacity_utilization as f64) * features.on_time_rate as f64
    } else {
        0.8
    };
    let alignment = 0.6 * features.location_match as f64 + 0.4 * urgency_readiness;

    clamp_unit(
        0.35 * features.rating_norm as f64
            + 0.25 * features.on_time_rate as f64
            + 0.25 * capability
            + 0.15 * alignment,
    )
}

/// Order cost estimate, always positive.
pub fn cost_estimate(
    features: &FeatureVector,
    config: &PredictionConfig,
    category_average: Option<f64>,
) -> f64 {
    let quantity = features.quantity.max(1.0) as f64;

    let unit_complexity = 1.0 + 0.15 * (features.requirement_complexity as f64).min(10.0);
    let base = quantity * config.base_unit_cost * unit_complexity;

    let industry = features.industry_cost_factor as f64;
    let economies_of_scale = quantity_scale_discount(quantity);
    let material_premium = 1.0 + 0.25 * features.specialty_material_share as f64;
    // Highly rated shops charge a premium, weak ones discount
    let rating_adjustment = 1.0 + (features.rating_norm as f64 * 5.0 - 3.0) * 0.05;
    let shipping = 1.0 + (1.0 - features.location_match as f64) * 0.06;
    let rush_premium = if features.is_rush > 0.5 { 1.25 } else { 1.0 };

    let estimate = base
        * industry
        * economies_of_scale
        * material_premium
        * rating_adjustment
        * shipping
        * rush_premium;

    let blended = match category_average {
        Some(average) if average > 0.0 => {
            estimate * (1.0 - config.history_blend) + average * config.history_blend
        }
        _ => estimate,
    };

    blended.max(1.0)
}

/// Lead-time estimate in days, always at least one.
pub fn delivery_days(features: &FeatureVector, config: &PredictionConfig) -> f64 {
    let quantity = features.quantity.max(1.0) as f64;

    // Regulated industries carry longer lead times, scaled down from the
    // cost multiplier.
    let industry = 1.0 + (features.industry_cost_factor as f64 - 1.0) * 0.4;
    let complexity = 1.0 + 0.08 * (features.requirement_complexity as f64).min(10.0);
    let quantity_scaling = quantity_lead_factor(quantity);
    let capacity_pressure = 1.0 + features.capacity_utilization as f64 * 0.5;
    let experience = experience_factor(features.years_in_business as f64);
    let certification_overhead =
        1.0 + (features.required_certifications as f64).min(3.0) * 0.05;
    let reliability = if (features.on_time_rate as f64) < 0.7 {
        1.15
    } else {
        1.0
    };
    let rush_compression = if features.is_rush > 0.5 { 0.75 } else { 1.0 };

    let sourcing_delay = features.specialty_material_share as f64 * 7.0;
    let shipping_delay = (1.0 - features.location_match as f64) * 3.0;

    let days = config.base_lead_days
        * industry
        * complexity
        * quantity_scaling
        * capacity_pressure
        * experience
        * certification_overhead
        * reliability
        * rush_compression
        + sourcing_delay
        + shipping_delay;

    days.max(1.0)
}

fn quantity_scale_discount(quantity: f64) -> f64 {
    if quantity >= 10_000.0 {
        0.7
    } else if quantity >= 1_000.0 {
        0.8
    } else if quantity >= 100.0 {
        0.9
    } else {
        1.0
    }
}

fn quantity_lead_factor(quantity: f64) -> f64 {
    if quantity >= 10_000.0 {
        2.0
    } else if quantity >= 1_000.0 {
        1.6
    } else if quantity >= 100.0 {
        1.3
    } else {
        1.0
    }
}

fn experience_factor(years: f64) -> f64 {
    if years >= 10.0 {
        0.9
    } else if years >= 5.0 {
        0.95
    } else {
        1.0
    }
}
