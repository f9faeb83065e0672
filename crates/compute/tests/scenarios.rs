//! End-to-end checks of the clustering and forecasting engines through the
//! public crate API.

use std::collections::BTreeSet;

use spine_compute::{
    euclidean_distance, AnalyticsError, ClusterRequest, ClusteringEngine, ClusteringMethod,
    Config, DomainFeatureSet, FeatureMatrix, ForecastMethod, ForecastRequest, ForecastingEngine,
    SegmentRegistry, TimeSeries, TrendLabel,
};

fn seeded_config() -> Config {
    let mut config = Config::default();
    config.clustering.seed = Some(42);
    config.forecast.seed = Some(42);
    config
}

fn clustering_engine() -> ClusteringEngine {
    let config = seeded_config();
    ClusteringEngine::new(config.clustering, &config.cache)
}

fn forecasting_engine() -> ForecastingEngine {
    let config = seeded_config();
    ForecastingEngine::new(config.forecast, &config.cache)
}

fn customers() -> FeatureMatrix {
    FeatureMatrix::new(vec![
        vec![1.0, 2.0],
        vec![1.5, 1.8],
        vec![5.0, 8.0],
        vec![8.0, 8.0],
        vec![1.0, 0.6],
        vec![9.0, 11.0],
    ])
    .unwrap()
}

fn revenue() -> TimeSeries {
    TimeSeries::new(vec![
        100.0, 102.0, 105.0, 103.0, 108.0, 110.0, 112.0, 115.0, 113.0, 118.0,
    ])
    .unwrap()
}

fn groups(assignment: &[i32]) -> BTreeSet<Vec<usize>> {
    let labels: BTreeSet<i32> = assignment.iter().copied().filter(|&l| l >= 0).collect();
    labels
        .into_iter()
        .map(|label| {
            assignment
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l == label)
                .map(|(i, _)| i)
                .collect()
        })
        .collect()
}

// ── Clustering ──────────────────────────────────────────────

#[test]
fn two_customer_groups_are_separated() {
    let result = clustering_engine().cluster(&customers(), Some(2)).unwrap();

    assert_eq!(result.num_clusters, 2);
    assert_eq!(result.noise_count, 0);
    let expected: BTreeSet<Vec<usize>> = [vec![0, 1, 4], vec![2, 3, 5]].into_iter().collect();
    assert_eq!(groups(&result.assignment), expected);
    assert!((-1.0..=1.0).contains(&result.silhouette_score));
    assert!((0.0..=1.0).contains(&result.quality));
}

#[test]
fn too_many_clusters_is_invalid_input() {
    let err = clustering_engine().cluster(&customers(), Some(7)).unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidInput(_)));
}

#[test]
fn every_method_yields_a_valid_partition() {
    let engine = clustering_engine();
    let matrix = customers();
    for method in [
        ClusteringMethod::KMeans,
        ClusteringMethod::Hierarchical,
        ClusteringMethod::Dbscan,
        ClusteringMethod::Ensemble,
    ] {
        let result = engine
            .cluster_with(&matrix, &ClusterRequest::method(method, Some(2)))
            .unwrap();
        assert_eq!(
            result.sizes.iter().sum::<usize>() + result.noise_count,
            matrix.n_rows(),
            "{}",
            method
        );
        assert_eq!(result.centroids.len(), result.num_clusters);
        assert!(result.assignment.iter().all(|&l| l >= -1 && l < result.num_clusters as i32));
    }
}

#[test]
fn repeated_clustering_is_served_from_cache() {
    let engine = clustering_engine();
    let first = engine.cluster(&customers(), Some(2)).unwrap();
    let second = engine.cluster(&customers(), Some(2)).unwrap();
    assert_eq!(first.assignment, second.assignment);
    assert_eq!(first.silhouette_score, second.silhouette_score);
    assert_eq!(engine.cache_len(), 1);
}

#[test]
fn segmentation_fills_the_registry() {
    let matrix = FeatureMatrix::new(vec![
        vec![12.0, 200.0, 2.0, 1.0],
        vec![10.0, 180.0, 3.0, 2.0],
        vec![11.0, 220.0, 1.0, 1.0],
        vec![1.0, 40.0, 60.0, 2.0],
        vec![2.0, 50.0, 45.0, 1.0],
        vec![1.0, 30.0, 50.0, 2.0],
    ])
    .unwrap();
    let mut registry = SegmentRegistry::new();
    let segments = clustering_engine()
        .segment(
            &matrix,
            &DomainFeatureSet::booking_behavior(),
            &ClusterRequest::ensemble(2),
            &mut registry,
        )
        .unwrap();

    assert_eq!(segments.len(), 2);
    assert_eq!(registry.by_domain("booking_behavior").len(), 2);
    assert_eq!(segments.iter().map(|s| s.size).sum::<usize>(), 6);
}

#[test]
fn distance_is_symmetric() {
    let a = [1.0, 2.0, 3.0];
    let b = [4.0, 0.0, -1.0];
    assert_eq!(
        euclidean_distance(&a, &b).unwrap(),
        euclidean_distance(&b, &a).unwrap()
    );
    assert_eq!(euclidean_distance(&a, &a).unwrap(), 0.0);
}

// ── Forecasting ─────────────────────────────────────────────

#[test]
fn rising_revenue_forecasts_upward() {
    let result = forecasting_engine().forecast(&revenue(), 5).unwrap();

    assert_eq!(result.predictions.len(), 5);
    assert_eq!(result.trend, TrendLabel::Increasing);
    assert!(result.rmse >= 0.0);
    assert!(result.predictions.iter().all(|p| *p > 110.0 && *p < 135.0));
}

#[test]
fn every_horizon_yields_matching_lengths() {
    let engine = forecasting_engine();
    for horizon in 1..=8 {
        let result = engine.forecast(&revenue(), horizon).unwrap();
        assert_eq!(result.predictions.len(), horizon);
        assert_eq!(result.confidence_interval.len(), horizon);
        assert!(result.confidence_interval.iter().all(|(lo, hi)| lo <= hi));
    }
}

#[test]
fn single_methods_cover_the_horizon() {
    let engine = forecasting_engine();
    for method in [
        ForecastMethod::Arima,
        ForecastMethod::ExponentialSmoothing,
        ForecastMethod::Prophet,
        ForecastMethod::Lstm,
        ForecastMethod::Naive,
    ] {
        let result = engine
            .forecast_with(&revenue(), &ForecastRequest::method(method, 3))
            .unwrap();
        assert_eq!(result.method, method);
        assert_eq!(result.predictions.len(), 3);
    }
}

#[test]
fn repeated_forecast_is_identical() {
    let engine = forecasting_engine();
    let first = engine.forecast(&revenue(), 5).unwrap();
    let second = engine.forecast(&revenue(), 5).unwrap();
    assert_eq!(first.predictions, second.predictions);
    assert_eq!(first.confidence, second.confidence);
}

#[test]
fn invalid_forecast_requests_pass_through_unwrapped() {
    let engine = forecasting_engine();
    let err = engine.forecast(&revenue(), 0).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(!err.to_string().contains("Ensemble forecasting failed"));

    let short = TimeSeries::new(vec![5.0, 6.0]).unwrap();
    let err = engine.forecast(&short, 3).unwrap_err();
    assert!(err.is_invalid_input());
    assert!(!err.to_string().contains("Ensemble forecasting failed"));
}

#[test]
fn estimator_failures_carry_the_ensemble_context() {
    let err = AnalyticsError::computation("seasonal decomposition failed")
        .in_ensemble("Ensemble forecasting failed");
    assert!(matches!(err, AnalyticsError::Computation(_)));
    assert_eq!(
        err.to_string(),
        "Ensemble forecasting failed: seasonal decomposition failed"
    );
}

#[test]
fn config_document_drives_engines() {
    let config: Config = serde_json::from_str(
        r#"{
            "clustering": { "seed": 3, "consensus": "greedy" },
            "forecast": { "seed": 3, "adaptive": true },
            "cache": { "enabled": false }
        }"#,
    )
    .unwrap();
    config.validate().unwrap();

    let clustering = ClusteringEngine::new(config.clustering.clone(), &config.cache);
    let result = clustering.cluster(&customers(), Some(2)).unwrap();
    assert_eq!(result.num_clusters, 2);
    assert_eq!(clustering.cache_len(), 0);

    let forecasting = ForecastingEngine::new(config.forecast.clone(), &config.cache);
    let result = forecasting.forecast(&revenue(), 3).unwrap();
    assert_eq!(result.weights.len(), 3);
    assert!(forecasting.method_errors().unwrap().iter().all(|(_, e)| e.is_some()));
}
