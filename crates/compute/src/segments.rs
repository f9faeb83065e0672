//! User segments: clusters characterized for a business domain.
//!
//! A [`DomainFeatureSet`] names the columns of a feature matrix and gives
//! each a weight and a role. After clustering, every non-empty cluster is
//! summarized into a [`UserSegment`] and stored in a [`SegmentRegistry`].

use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use spine_core::{AnalyticsError, FeatureMatrix, Result};

use crate::algorithms::distance::normalize_features;
use crate::algorithms::stats::{mean, std_dev};
use crate::types::ClusterResult;

/// Normalized mean at or above which a feature counts as high.
const HIGH_CUTOFF: f64 = 0.66;
/// Normalized mean at or below which a feature counts as low.
const LOW_CUTOFF: f64 = 0.33;
/// Churn risk at or above which a segment is tagged `at_risk`.
const AT_RISK_CUTOFF: f64 = 0.6;
/// Months the monthly value is projected over for lifetime value.
const LTV_MONTHS: f64 = 12.0;

/// How a feature feeds segment scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureRole {
    /// Activity count per period. Higher is better.
    Frequency,
    /// Money per entity or per transaction. Higher is better.
    Monetary,
    /// Time since last activity. Lower is better.
    Recency,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub weight: f64,
    pub role: FeatureRole,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, weight: f64, role: FeatureRole) -> Self {
        Self {
            name: name.into(),
            weight,
            role,
        }
    }
}

/// Column layout of a feature matrix for one business domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainFeatureSet {
    pub domain: String,
    pub features: Vec<FeatureSpec>,
}

impl DomainFeatureSet {
    pub fn booking_behavior() -> Self {
        Self {
            domain: "booking_behavior".into(),
            features: vec![
                FeatureSpec::new("frequency", 0.3, FeatureRole::Frequency),
                FeatureSpec::new("average_value", 0.3, FeatureRole::Monetary),
                FeatureSpec::new("recency", 0.25, FeatureRole::Recency),
                FeatureSpec::new("service_type", 0.15, FeatureRole::Neutral),
            ],
        }
    }

    pub fn spending_pattern() -> Self {
        Self {
            domain: "spending_pattern".into(),
            features: vec![
                FeatureSpec::new("total_spend", 0.35, FeatureRole::Monetary),
                FeatureSpec::new("transaction_count", 0.3, FeatureRole::Frequency),
                FeatureSpec::new("average_basket", 0.2, FeatureRole::Monetary),
                FeatureSpec::new("discount_usage", 0.15, FeatureRole::Neutral),
            ],
        }
    }

    /// Look up a built-in domain by name.
    pub fn builtin(domain: &str) -> Option<Self> {
        match domain {
            "booking_behavior" => Some(Self::booking_behavior()),
            "spending_pattern" => Some(Self::spending_pattern()),
            _ => None,
        }
    }

    /// Equal-weight neutral features, for ad-hoc domains.
    pub fn uniform<S: Into<String>>(domain: impl Into<String>, names: Vec<S>) -> Self {
        Self {
            domain: domain.into(),
            features: names
                .into_iter()
                .map(|n| FeatureSpec::new(n, 1.0, FeatureRole::Neutral))
                .collect(),
        }
    }

    pub fn validate(&self, n_cols: usize) -> Result<()> {
        if self.features.len() != n_cols {
            return Err(AnalyticsError::invalid(format!(
                "domain {} describes {} features but the matrix has {} columns",
                self.domain,
                self.features.len(),
                n_cols
            )));
        }
        if self.features.iter().any(|f| !f.weight.is_finite() || f.weight < 0.0) {
            return Err(AnalyticsError::invalid(format!(
                "domain {}: feature weights must be finite and non-negative",
                self.domain
            )));
        }
        Ok(())
    }

    fn first_with_role(&self, role: FeatureRole) -> Option<usize> {
        self.features.iter().position(|f| f.role == role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTier {
    High,
    Medium,
    Low,
}

impl ValueTier {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_CUTOFF {
            ValueTier::High
        } else if score >= LOW_CUTOFF {
            ValueTier::Medium
        } else {
            ValueTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueTier::High => "high",
            ValueTier::Medium => "medium",
            ValueTier::Low => "low",
        }
    }
}

impl fmt::Display for ValueTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistics of one feature over a segment's raw rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
}

impl FeatureSummary {
    fn of(values: &[f64]) -> Self {
        Self {
            mean: mean(values),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            std_dev: std_dev(values),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSegment {
    /// `{domain}_{cluster label}`.
    pub segment_id: String,
    pub name: String,
    pub domain: String,
    pub size: usize,
    /// Keyed by feature name, in column order.
    pub characteristics: IndexMap<String, FeatureSummary>,
    pub behaviors: Vec<String>,
    pub value: ValueTier,
    pub churn_risk: f64,
    pub ltv: f64,
    pub created_at: DateTime<Utc>,
}

/// Summarize every non-empty cluster of `result` as a segment of
/// `features.domain`. Noise rows belong to no segment.
pub fn characterize(
    matrix: &FeatureMatrix,
    result: &ClusterResult,
    features: &DomainFeatureSet,
) -> Result<Vec<UserSegment>> {
    features.validate(matrix.n_cols())?;
    if result.assignment.len() != matrix.n_rows() {
        return Err(AnalyticsError::invalid(format!(
            "assignment covers {} rows but the matrix has {}",
            result.assignment.len(),
            matrix.n_rows()
        )));
    }

    let normalized = normalize_features(matrix);
    let created_at = Utc::now();
    let mut segments = Vec::with_capacity(result.num_clusters);

    for label in 0..result.num_clusters as i32 {
        let members = result.members(label);
        if members.is_empty() {
            continue;
        }

        let mut characteristics = IndexMap::with_capacity(features.features.len());
        let mut norm_means = Vec::with_capacity(features.features.len());
        for (j, spec) in features.features.iter().enumerate() {
            let raw: Vec<f64> = members.iter().map(|&i| matrix.row(i)[j]).collect();
            let scaled: Vec<f64> = members.iter().map(|&i| normalized.row(i)[j]).collect();
            characteristics.insert(spec.name.clone(), FeatureSummary::of(&raw));
            norm_means.push(mean(&scaled));
        }

        let score = weighted_score(features, &norm_means);
        let value = ValueTier::from_score(score);
        let churn_risk = churn_risk(features, &norm_means, score);
        let ltv = lifetime_value(features, &characteristics, churn_risk);
        let behaviors = behavior_tags(features, &norm_means, churn_risk);

        segments.push(UserSegment {
            segment_id: format!("{}_{}", features.domain, label),
            name: format!("{} value {} segment {}", value, features.domain, label),
            domain: features.domain.clone(),
            size: members.len(),
            characteristics,
            behaviors,
            value,
            churn_risk,
            ltv,
            created_at,
        });
    }
    Ok(segments)
}

// ── Scoring ──────────────────────────────────────────────────

/// Weight-averaged normalized means, recency inverted. Zero total weight
/// falls back to a plain average.
fn weighted_score(features: &DomainFeatureSet, norm_means: &[f64]) -> f64 {
    let oriented: Vec<f64> = features
        .features
        .iter()
        .zip(norm_means)
        .map(|(f, &m)| if f.role == FeatureRole::Recency { 1.0 - m } else { m })
        .collect();
    let total: f64 = features.features.iter().map(|f| f.weight).sum();
    if total <= 0.0 {
        return mean(&oriented);
    }
    features
        .features
        .iter()
        .zip(&oriented)
        .map(|(f, m)| f.weight * m)
        .sum::<f64>()
        / total
}

fn churn_risk(features: &DomainFeatureSet, norm_means: &[f64], score: f64) -> f64 {
    let mut signals = Vec::with_capacity(2);
    if let Some(j) = features.first_with_role(FeatureRole::Recency) {
        signals.push(norm_means[j]);
    }
    if let Some(j) = features.first_with_role(FeatureRole::Frequency) {
        signals.push(1.0 - norm_means[j]);
    }
    let risk = if signals.is_empty() { 1.0 - score } else { mean(&signals) };
    risk.clamp(0.0, 1.0)
}

fn lifetime_value(
    features: &DomainFeatureSet,
    characteristics: &IndexMap<String, FeatureSummary>,
    churn_risk: f64,
) -> f64 {
    let raw_mean = |role| {
        features
            .first_with_role(role)
            .and_then(|j| characteristics.get_index(j))
            .map(|(_, s)| s.mean)
    };
    let Some(monetary) = raw_mean(FeatureRole::Monetary) else {
        return 0.0;
    };
    let frequency = raw_mean(FeatureRole::Frequency).unwrap_or(1.0);
    (monetary * frequency * (1.0 - churn_risk) * LTV_MONTHS).max(0.0)
}

fn behavior_tags(features: &DomainFeatureSet, norm_means: &[f64], churn_risk: f64) -> Vec<String> {
    let mut tags: Vec<String> = features
        .features
        .iter()
        .zip(norm_means)
        .filter_map(|(f, &m)| {
            if m >= HIGH_CUTOFF {
                Some(format!("high_{}", f.name))
            } else if m <= LOW_CUTOFF {
                Some(format!("low_{}", f.name))
            } else {
                None
            }
        })
        .collect();
    if churn_risk >= AT_RISK_CUTOFF {
        tags.push("at_risk".into());
    }
    if tags.is_empty() {
        tags.push("average".into());
    }
    tags
}

// ── Registry ─────────────────────────────────────────────────

/// Segments keyed by `segment_id`, in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentRegistry {
    segments: IndexMap<String, UserSegment>,
}

impl SegmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every segment of `domain` and store `segments` in its place.
    pub fn replace_domain(&mut self, domain: &str, segments: Vec<UserSegment>) {
        self.segments.retain(|_, s| s.domain != domain);
        for segment in segments {
            self.segments.insert(segment.segment_id.clone(), segment);
        }
    }

    pub fn get(&self, segment_id: &str) -> Option<&UserSegment> {
        self.segments.get(segment_id)
    }

    pub fn by_domain(&self, domain: &str) -> Vec<&UserSegment> {
        self.segments.values().filter(|s| s.domain == domain).collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &UserSegment> {
        self.segments.values()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
