use std::collections::HashMap;

use crate::algorithms::stats::{self, extract_seasonality, mean, std_dev};
use crate::types::{ForecastMethod, MethodWeight, TrendLabel};

/// Bounds applied to every per-step confidence value.
pub const MIN_CONFIDENCE: f64 = 0.5;
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Standard error of a prediction, as a fraction of the mean absolute prediction.
const STANDARD_ERROR_FRACTION: f64 = 0.1;

/// One member's contribution to an ensemble forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberForecast {
    pub method: ForecastMethod,
    pub weight: f64,
    pub predictions: Vec<f64>,
}

/// Scale weights to sum to 1. Non-positive totals fall back to equal weights.
pub fn normalize_weights(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 || weights.is_empty() {
        let equal = 1.0 / weights.len().max(1) as f64;
        return vec![equal; weights.len()];
    }
    weights.iter().map(|w| w.max(0.0) / total).collect()
}

pub fn method_weights(members: &[MemberForecast]) -> Vec<MethodWeight> {
    members
        .iter()
        .map(|m| MethodWeight {
            method: m.method,
            weight: m.weight,
        })
        .collect()
}

/// Per-step weighted average of the member predictions.
pub fn combine(members: &[MemberForecast]) -> Vec<f64> {
    let horizon = members.first().map_or(0, |m| m.predictions.len());
    (0..horizon)
        .map(|step| {
            members
                .iter()
                .map(|m| m.weight * m.predictions[step])
                .sum()
        })
        .collect()
}

/// Agreement between members at each step: `1 − std/|mean|`, clamped to
/// [`MIN_CONFIDENCE`, `MAX_CONFIDENCE`].
pub fn step_confidence(members: &[MemberForecast]) -> Vec<f64> {
    let horizon = members.first().map_or(0, |m| m.predictions.len());
    (0..horizon)
        .map(|step| {
            let values: Vec<f64> = members.iter().map(|m| m.predictions[step]).collect();
            let spread = std_dev(&values);
            let scale = mean(&values).abs().max(f64::EPSILON);
            (1.0 - spread / scale).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
        })
        .collect()
}

/// Confidence for a single estimator, where there is no cross-method spread
/// to measure: derived from its percentage error against recent history.
pub fn fit_confidence(mape: f64) -> f64 {
    (1.0 - mape / 100.0).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

/// Two-sided z value for the supported interval levels (95% otherwise).
pub fn z_score(level: f64) -> f64 {
    if (level - 0.90).abs() < 1e-9 {
        1.645
    } else if (level - 0.99).abs() < 1e-9 {
        2.576
    } else {
        1.96
    }
}

/// Symmetric intervals of `z × SE` around every prediction, where SE is
/// 10% of the mean absolute prediction.
pub fn confidence_intervals(predictions: &[f64], level: f64) -> Vec<(f64, f64)> {
    let abs: Vec<f64> = predictions.iter().map(|p| p.abs()).collect();
    let margin = z_score(level) * STANDARD_ERROR_FRACTION * mean(&abs);
    predictions.iter().map(|&p| (p - margin, p + margin)).collect()
}

/// Compare the first and last prediction against `threshold × |first|`.
pub fn trend_label(predictions: &[f64], threshold: f64) -> TrendLabel {
    let (Some(&first), Some(&last)) = (predictions.first(), predictions.last()) else {
        return TrendLabel::Stable;
    };
    let limit = threshold * first.abs();
    let change = last - first;
    if change > limit {
        TrendLabel::Increasing
    } else if change < -limit {
        TrendLabel::Decreasing
    } else {
        TrendLabel::Stable
    }
}

/// Label every member trajectory and take the weighted vote. A label needs
/// more than half the weight; otherwise the combined trajectory decides.
pub fn voted_trend(members: &[MemberForecast], combined: &[f64], threshold: f64) -> TrendLabel {
    let mut votes: HashMap<TrendLabel, f64> = HashMap::new();
    for m in members {
        *votes.entry(trend_label(&m.predictions, threshold)).or_default() += m.weight;
    }
    let total: f64 = votes.values().sum();

    votes
        .into_iter()
        .filter(|(_, weight)| total > 0.0 && *weight / total > 0.5)
        .map(|(label, _)| label)
        .next()
        .unwrap_or_else(|| trend_label(combined, threshold))
}

/// RMS of the de-meaned seasonal component relative to the series mean,
/// clamped to [0, 1]. Short or zero-mean series score 0.
pub fn seasonality_strength(series: &[f64]) -> f64 {
    if series.len() < stats::MIN_SEASONAL_LEN {
        return 0.0;
    }
    let Ok(seasonal) = extract_seasonality(series) else {
        return 0.0;
    };
    let level = mean(series).abs();
    if level < f64::EPSILON {
        return 0.0;
    }
    let rms = (seasonal.iter().map(|s| s * s).sum::<f64>() / seasonal.len() as f64).sqrt();
    (rms / level).clamp(0.0, 1.0)
}
