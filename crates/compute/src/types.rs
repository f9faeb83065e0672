use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spine_core::AnalyticsError;

use crate::algorithms::quality::QualityReport;
use crate::algorithms::Partition;

// ── Clustering ───────────────────────────────────────────────

/// Which estimator produced a clustering result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringMethod {
    KMeans,
    Hierarchical,
    Dbscan,
    /// Consensus of k-means, hierarchical and DBSCAN.
    #[default]
    Ensemble,
}

impl ClusteringMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KMeans => "kmeans",
            Self::Hierarchical => "hierarchical",
            Self::Dbscan => "dbscan",
            Self::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for ClusteringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClusteringMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" | "k_means" => Ok(Self::KMeans),
            "hierarchical" | "agglomerative" => Ok(Self::Hierarchical),
            "dbscan" => Ok(Self::Dbscan),
            "ensemble" => Ok(Self::Ensemble),
            other => Err(AnalyticsError::invalid(format!(
                "unknown clustering method: {}",
                other
            ))),
        }
    }
}

/// A partition of the input rows plus its quality scores.
///
/// Labels are consecutive from 0; `-1` marks noise. `centroids` and `sizes`
/// are indexed by label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterResult {
    pub assignment: Vec<i32>,
    /// Cluster means in the space clustering ran in: min-max normalized
    /// feature values when the engine normalizes, raw values otherwise.
    pub centroids: Vec<Vec<f64>>,
    pub sizes: Vec<usize>,
    pub num_clusters: usize,
    pub noise_count: usize,
    pub silhouette_score: f64,
    pub davies_bouldin_index: f64,
    pub inertia: f64,
    pub quality: f64,
    pub method: ClusteringMethod,
    pub timestamp: DateTime<Utc>,
}

impl ClusterResult {
    pub fn from_partition(
        points: &[Vec<f64>],
        partition: Partition,
        method: ClusteringMethod,
    ) -> Self {
        let report = QualityReport::evaluate(points, &partition);
        Self {
            sizes: partition.sizes(),
            num_clusters: partition.num_clusters(),
            noise_count: partition.noise_count(),
            assignment: partition.labels,
            centroids: partition.centroids,
            silhouette_score: report.silhouette,
            davies_bouldin_index: report.davies_bouldin,
            inertia: report.inertia,
            quality: report.quality,
            method,
            timestamp: Utc::now(),
        }
    }

    /// Row indices belonging to `label`.
    pub fn members(&self, label: i32) -> Vec<usize> {
        self.assignment
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == label)
            .map(|(i, _)| i)
            .collect()
    }
}

// ── Forecasting ──────────────────────────────────────────────

/// Forecasting estimators. The names describe the flavour of each
/// lightweight approximation, not a faithful model implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Linear trend extrapolation with small random perturbation.
    Arima,
    /// Simple exponential smoothing, flat forecast.
    ExponentialSmoothing,
    /// Linear trend plus periodic component.
    Prophet,
    /// Autoregressive weighted moving average over a short window.
    Lstm,
    /// Repeat the last observation.
    Naive,
    /// Weighted combination of member methods.
    #[default]
    Ensemble,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arima => "arima",
            Self::ExponentialSmoothing => "exponential_smoothing",
            Self::Prophet => "prophet",
            Self::Lstm => "lstm",
            Self::Naive => "naive",
            Self::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arima" => Ok(Self::Arima),
            "exponential_smoothing" | "exponential" | "ses" => Ok(Self::ExponentialSmoothing),
            "prophet" => Ok(Self::Prophet),
            "lstm" => Ok(Self::Lstm),
            "naive" => Ok(Self::Naive),
            "ensemble" => Ok(Self::Ensemble),
            other => Err(AnalyticsError::invalid(format!(
                "unknown forecast method: {}",
                other
            ))),
        }
    }
}

/// Direction of the forecast trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Increasing,
    Decreasing,
    Stable,
}

/// Weight a member method carried in an ensemble forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MethodWeight {
    pub method: ForecastMethod,
    pub weight: f64,
}

/// Multi-step projection with uncertainty bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub predictions: Vec<f64>,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
    pub step_confidence: Vec<f64>,
    /// `(lower, upper)` per step.
    pub confidence_interval: Vec<(f64, f64)>,
    pub trend: TrendLabel,
    /// Seasonal strength in [0, 1].
    pub seasonality: f64,
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
    pub method: ForecastMethod,
    /// Member weights used; empty for single-method forecasts.
    pub weights: Vec<MethodWeight>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_round_trip_through_str() {
        for m in [
            ClusteringMethod::KMeans,
            ClusteringMethod::Hierarchical,
            ClusteringMethod::Dbscan,
            ClusteringMethod::Ensemble,
        ] {
            assert_eq!(m.as_str().parse::<ClusteringMethod>().unwrap(), m);
        }
        assert_eq!("ses".parse::<ForecastMethod>().unwrap(), ForecastMethod::ExponentialSmoothing);
        assert!("arimax".parse::<ForecastMethod>().is_err());
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ForecastMethod::ExponentialSmoothing).unwrap();
        assert_eq!(json, "\"exponential_smoothing\"");
        let json = serde_json::to_string(&TrendLabel::Increasing).unwrap();
        assert_eq!(json, "\"increasing\"");
    }

    #[test]
    fn cluster_result_invariants_hold() {
        let points = vec![vec![0.0], vec![0.1], vec![5.0], vec![9.0]];
        let partition = Partition::from_labels(&points, &[4, 4, 1, -1]);
        let result = ClusterResult::from_partition(&points, partition, ClusteringMethod::Dbscan);
        assert_eq!(result.centroids.len(), result.sizes.len());
        assert_eq!(result.num_clusters, 2);
        assert_eq!(*result.assignment.iter().max().unwrap() as usize + 1, result.num_clusters);
        assert_eq!(result.sizes.iter().sum::<usize>() + result.noise_count, points.len());
        assert_eq!(result.members(0), vec![0, 1]);
    }
}
