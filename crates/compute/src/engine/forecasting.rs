use std::sync::Mutex;
use std::time::Instant;

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spine_core::{AnalyticsError, CacheConfig, ForecastConfig, Result, TimeSeries};

use super::SeededRng;
use crate::algorithms::stats::{error_metrics, mean};
use crate::cache::{cache_key, ResultCache};
use crate::forecast::adaptive::{backtest, PerformanceTracker};
use crate::forecast::ensemble::{
    self, confidence_intervals, fit_confidence, normalize_weights, seasonality_strength,
    step_confidence, trend_label, voted_trend, MemberForecast,
};
use crate::forecast::models::{self, min_length, ModelParams};
use crate::types::{ForecastMethod, ForecastResult};

const ENSEMBLE_CONTEXT: &str = "Ensemble forecasting failed";

/// Ensemble members and their static weights.
pub const DEFAULT_MEMBERS: [(ForecastMethod, f64); 3] = [
    (ForecastMethod::Arima, 0.35),
    (ForecastMethod::ExponentialSmoothing, 0.25),
    (ForecastMethod::Prophet, 0.40),
];

/// Forecast parameters. `adaptive: None` defers to the engine config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub horizon: usize,
    #[serde(default)]
    pub method: ForecastMethod,
    #[serde(default)]
    pub adaptive: Option<bool>,
}

impl ForecastRequest {
    pub fn ensemble(horizon: usize) -> Self {
        Self {
            horizon,
            method: ForecastMethod::Ensemble,
            adaptive: None,
        }
    }

    pub fn method(method: ForecastMethod, horizon: usize) -> Self {
        Self {
            horizon,
            method,
            adaptive: None,
        }
    }
}

/// Runs the forecasting estimators and blends them into one projection.
pub struct ForecastingEngine {
    config: ForecastConfig,
    params: ModelParams,
    members: Vec<(ForecastMethod, f64)>,
    cache: ResultCache<ForecastResult>,
    rng: SeededRng,
    tracker: Mutex<PerformanceTracker>,
}

impl ForecastingEngine {
    pub fn new(config: ForecastConfig, cache: &CacheConfig) -> Self {
        let cache = if cache.enabled {
            let ttl = i64::try_from(cache.forecast_ttl_secs)
                .ok()
                .and_then(Duration::try_seconds);
            if ttl.is_none() {
                warn!(
                    ttl_secs = cache.forecast_ttl_secs,
                    "forecast cache TTL out of range, entries will not expire"
                );
            }
            ResultCache::new("forecast", cache.capacity, ttl)
        } else {
            ResultCache::disabled("forecast")
        };
        Self {
            params: ModelParams::from(&config),
            members: DEFAULT_MEMBERS.to_vec(),
            rng: SeededRng::new(config.seed),
            tracker: Mutex::new(PerformanceTracker::new(config.adaptive_smoothing)),
            cache,
            config,
        }
    }

    /// Replace the ensemble members. Weights must be finite, non-negative,
    /// and not all zero; they are normalized at forecast time.
    pub fn with_members(mut self, members: Vec<(ForecastMethod, f64)>) -> Result<Self> {
        if members.is_empty() {
            return Err(AnalyticsError::Config("ensemble needs at least one member".into()));
        }
        if members.iter().any(|(m, _)| *m == ForecastMethod::Ensemble) {
            return Err(AnalyticsError::Config("ensemble cannot contain itself".into()));
        }
        if members.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(AnalyticsError::Config(
                "member weights must be finite and non-negative".into(),
            ));
        }
        if members.iter().all(|(_, w)| *w == 0.0) {
            return Err(AnalyticsError::Config("member weights are all zero".into()));
        }
        self.members = members;
        Ok(self)
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn members(&self) -> &[(ForecastMethod, f64)] {
        &self.members
    }

    /// Ensemble forecast `horizon` steps ahead.
    pub fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        self.forecast_with(series, &ForecastRequest::ensemble(horizon))
    }

    pub fn forecast_with(
        &self,
        series: &TimeSeries,
        request: &ForecastRequest,
    ) -> Result<ForecastResult> {
        if request.horizon == 0 {
            return Err(AnalyticsError::invalid("horizon must be at least 1"));
        }
        let needed = self.min_length(request.method);
        if series.len() < needed {
            return Err(AnalyticsError::invalid(format!(
                "{} forecasting needs at least {} observations, got {}",
                request.method,
                needed,
                series.len()
            )));
        }

        let adaptive = request.adaptive.unwrap_or(self.config.adaptive);
        let resolved = ForecastRequest {
            adaptive: Some(adaptive),
            ..*request
        };
        let key = cache_key(
            series.values(),
            series.len(),
            &(&resolved, &self.config, &self.members),
        );
        if let Some(hit) = self.cache.get(&key)? {
            debug!(method = %request.method, horizon = request.horizon, "returning cached forecast");
            return Ok(hit);
        }

        let start = Instant::now();
        let mut rng = self.rng.child()?;
        let result = match request.method {
            ForecastMethod::Ensemble => self
                .forecast_ensemble(series, request.horizon, adaptive, &mut rng)
                .map_err(|e| e.in_ensemble(ENSEMBLE_CONTEXT))?,
            method => self.forecast_single(series, request.horizon, method, &mut rng)?,
        };

        info!(
            "Forecast ({}): {} observations, horizon {}, trend={:?}, confidence={:.3}, mape={:.2} ({:.1}ms)",
            request.method,
            series.len(),
            request.horizon,
            result.trend,
            result.confidence,
            result.mape,
            start.elapsed().as_secs_f64() * 1000.0
        );

        self.cache.insert(key, result.clone())?;
        Ok(result)
    }

    /// Tracked back-test error per ensemble member, `None` where untracked.
    pub fn method_errors(&self) -> Result<Vec<(ForecastMethod, Option<f64>)>> {
        let tracker = self.tracker()?;
        Ok(self
            .members
            .iter()
            .map(|(m, _)| (*m, tracker.error(*m)))
            .collect())
    }

    pub fn reset_performance(&self) -> Result<()> {
        self.tracker()?.reset();
        Ok(())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    // ── Estimators ───────────────────────────────────────────

    fn forecast_single(
        &self,
        series: &TimeSeries,
        horizon: usize,
        method: ForecastMethod,
        rng: &mut StdRng,
    ) -> Result<ForecastResult> {
        let predictions = models::forecast(method, series.values(), horizon, &self.params, rng)?;
        let metrics = error_metrics(series.tail(horizon), &predictions);
        let confidence = fit_confidence(metrics.mape);

        Ok(ForecastResult {
            confidence,
            step_confidence: vec![confidence; horizon],
            confidence_interval: confidence_intervals(&predictions, self.config.confidence_level),
            trend: trend_label(&predictions, self.config.trend_threshold),
            seasonality: seasonality_strength(series.values()),
            rmse: metrics.rmse,
            mae: metrics.mae,
            mape: metrics.mape,
            method,
            weights: Vec::new(),
            timestamp: Utc::now(),
            predictions,
        })
    }

    fn forecast_ensemble(
        &self,
        series: &TimeSeries,
        horizon: usize,
        adaptive: bool,
        rng: &mut StdRng,
    ) -> Result<ForecastResult> {
        let methods: Vec<ForecastMethod> = self.members.iter().map(|(m, _)| *m).collect();
        let weights = if adaptive {
            self.adaptive_weights(series, horizon, &methods, rng)?
        } else {
            let raw: Vec<f64> = self.members.iter().map(|(_, w)| *w).collect();
            normalize_weights(&raw)
        };

        let seeds: Vec<u64> = methods.iter().map(|_| rng.gen()).collect();
        let run = |(&method, &seed): (&ForecastMethod, &u64)| -> Result<Vec<f64>> {
            let mut member_rng = StdRng::seed_from_u64(seed);
            models::forecast(method, series.values(), horizon, &self.params, &mut member_rng)
        };
        let outputs: Vec<Result<Vec<f64>>> = if self.config.parallel {
            methods.par_iter().zip(seeds.par_iter()).map(run).collect()
        } else {
            methods.iter().zip(seeds.iter()).map(run).collect()
        };

        let mut members = Vec::with_capacity(methods.len());
        for ((method, weight), output) in methods.iter().zip(&weights).zip(outputs) {
            let predictions = output?;
            debug!(%method, weight, first = predictions[0], "ensemble member finished");
            members.push(MemberForecast {
                method: *method,
                weight: *weight,
                predictions,
            });
        }

        let predictions = ensemble::combine(&members);
        let step = step_confidence(&members);
        let metrics = error_metrics(series.tail(horizon), &predictions);

        Ok(ForecastResult {
            confidence: mean(&step),
            step_confidence: step,
            confidence_interval: confidence_intervals(&predictions, self.config.confidence_level),
            trend: voted_trend(&members, &predictions, self.config.trend_threshold),
            seasonality: seasonality_strength(series.values()),
            rmse: metrics.rmse,
            mae: metrics.mae,
            mape: metrics.mape,
            method: ForecastMethod::Ensemble,
            weights: ensemble::method_weights(&members),
            timestamp: Utc::now(),
            predictions,
        })
    }

    /// Back-test the members on this series, fold the errors into the
    /// tracker, and weight by inverse tracked error. Series too short to
    /// split get equal weights.
    fn adaptive_weights(
        &self,
        series: &TimeSeries,
        horizon: usize,
        methods: &[ForecastMethod],
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        let Some(errors) = backtest(series.values(), horizon, methods, &self.params, rng)? else {
            warn!(
                observations = series.len(),
                "series too short to back-test, using equal weights"
            );
            return Ok(normalize_weights(&vec![1.0; methods.len()]));
        };

        let mut tracker = self.tracker()?;
        for (method, error) in errors {
            debug!(%method, error, "back-test error");
            tracker.record(method, error);
        }
        Ok(tracker.weights(methods))
    }

    fn min_length(&self, method: ForecastMethod) -> usize {
        match method {
            ForecastMethod::Ensemble => self
                .members
                .iter()
                .map(|(m, _)| min_length(*m))
                .max()
                .unwrap_or(1),
            other => min_length(other),
        }
    }

    fn tracker(&self) -> Result<std::sync::MutexGuard<'_, PerformanceTracker>> {
        self.tracker
            .lock()
            .map_err(|e| AnalyticsError::LockPoisoned(format!("performance tracker: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrendLabel;

    fn engine() -> ForecastingEngine {
        let config = ForecastConfig {
            seed: Some(7),
            ..ForecastConfig::default()
        };
        ForecastingEngine::new(config, &CacheConfig::default())
    }

    fn revenue() -> TimeSeries {
        TimeSeries::new(vec![
            100.0, 102.0, 105.0, 103.0, 108.0, 110.0, 112.0, 115.0, 113.0, 118.0,
        ])
        .unwrap()
    }

    #[test]
    fn ensemble_forecast_shape() {
        let result = engine().forecast(&revenue(), 5).unwrap();
        assert_eq!(result.predictions.len(), 5);
        assert_eq!(result.step_confidence.len(), 5);
        assert_eq!(result.confidence_interval.len(), 5);
        assert_eq!(result.method, ForecastMethod::Ensemble);
        assert_eq!(result.trend, TrendLabel::Increasing);
        assert!(result.rmse >= 0.0);
        assert!((0.0..=1.0).contains(&result.confidence));
        for (p, (lo, hi)) in result.predictions.iter().zip(&result.confidence_interval) {
            assert!(lo <= p && p <= hi);
        }
        let total: f64 = result.weights.iter().map(|w| w.weight).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_method_has_no_weights() {
        let result = engine()
            .forecast_with(&revenue(), &ForecastRequest::method(ForecastMethod::Naive, 3))
            .unwrap();
        assert_eq!(result.predictions, vec![118.0; 3]);
        assert!(result.weights.is_empty());
        assert_eq!(result.trend, TrendLabel::Stable);
        assert!(result.confidence >= 0.5 && result.confidence <= 0.95);
    }

    #[test]
    fn rejects_bad_requests() {
        let engine = engine();
        assert!(engine.forecast(&revenue(), 0).unwrap_err().is_invalid_input());
        let short = TimeSeries::new(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(engine.forecast(&short, 2).unwrap_err().is_invalid_input());
        // Naive alone runs on a single point.
        let one = TimeSeries::new(vec![4.0]).unwrap();
        assert!(engine
            .forecast_with(&one, &ForecastRequest::method(ForecastMethod::Naive, 2))
            .is_ok());
    }

    #[test]
    fn custom_members_are_validated() {
        assert!(engine().with_members(Vec::new()).is_err());
        assert!(engine()
            .with_members(vec![(ForecastMethod::Ensemble, 1.0)])
            .is_err());
        assert!(engine()
            .with_members(vec![(ForecastMethod::Naive, -1.0)])
            .is_err());

        let engine = engine()
            .with_members(vec![(ForecastMethod::Naive, 1.0), (ForecastMethod::Lstm, 1.0)])
            .unwrap();
        let result = engine.forecast(&revenue(), 2).unwrap();
        assert_eq!(result.weights.len(), 2);
        assert!((result.weights[0].weight - 0.5).abs() < 1e-12);
    }

    #[test]
    fn adaptive_weights_favour_better_backtest() {
        let engine = engine()
            .with_members(vec![
                (ForecastMethod::Naive, 1.0),
                (ForecastMethod::Prophet, 1.0),
            ])
            .unwrap();
        // Perfect line: trend extrapolation nails the hold-out, naive lags.
        let line = TimeSeries::new((0..20).map(|i| 10.0 + 2.0 * i as f64).collect()).unwrap();
        let request = ForecastRequest {
            adaptive: Some(true),
            ..ForecastRequest::ensemble(4)
        };
        let result = engine.forecast_with(&line, &request).unwrap();
        assert!(result.weights[1].weight > result.weights[0].weight);

        let errors = engine.method_errors().unwrap();
        assert!(errors.iter().all(|(_, e)| e.is_some()));
        engine.reset_performance().unwrap();
        assert!(engine.method_errors().unwrap().iter().all(|(_, e)| e.is_none()));
    }

    #[test]
    fn tracked_errors_survive_a_change_of_scale() {
        let engine = ForecastingEngine::new(
            ForecastConfig {
                seed: Some(7),
                noise_scale: 0.0,
                adaptive: true,
                ..ForecastConfig::default()
            },
            &CacheConfig::default(),
        )
        .with_members(vec![(ForecastMethod::Naive, 1.0), (ForecastMethod::Arima, 1.0)])
        .unwrap();

        // Millions on a clean line: trend extrapolation wins the back-test.
        let large = TimeSeries::new((0..20).map(|i| 1e6 + 1e4 * i as f64).collect()).unwrap();
        let first = engine.forecast(&large, 3).unwrap();
        assert!(first.weights[1].weight > first.weights[0].weight);

        // A small series that has levelled off: the flat forecast wins, and
        // the large series' errors must not drown that out.
        let plateau: Vec<f64> = (0..16).map(f64::from).chain([15.0; 4]).collect();
        let second = engine.forecast(&TimeSeries::new(plateau).unwrap(), 3).unwrap();
        assert_eq!(second.weights[0].method, ForecastMethod::Naive);
        assert!(
            second.weights[0].weight > second.weights[1].weight,
            "weights {:?}",
            second.weights
        );
    }

    #[test]
    fn short_series_gets_equal_adaptive_weights() {
        let engine = ForecastingEngine::new(
            ForecastConfig {
                seed: Some(7),
                adaptive: true,
                ..ForecastConfig::default()
            },
            &CacheConfig::default(),
        );
        // Four points satisfy every member but leave nothing to hold out.
        let series = TimeSeries::new(vec![10.0, 12.0, 11.0, 13.0]).unwrap();
        let result = engine.forecast(&series, 2).unwrap();
        assert_eq!(result.weights.len(), 3);
        for w in &result.weights {
            assert!((w.weight - 1.0 / 3.0).abs() < 1e-12, "{:?}", w);
        }
        assert!(engine.method_errors().unwrap().iter().all(|(_, e)| e.is_none()));
    }

    #[test]
    fn oversized_ttl_disables_expiry() {
        let cache = CacheConfig {
            forecast_ttl_secs: u64::MAX / 2,
            ..CacheConfig::default()
        };
        let engine = ForecastingEngine::new(
            ForecastConfig {
                seed: Some(7),
                ..ForecastConfig::default()
            },
            &cache,
        );
        let first = engine.forecast(&revenue(), 3).unwrap();
        let second = engine.forecast(&revenue(), 3).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_len(), 1);
    }

    #[test]
    fn cached_forecast_is_returned_unchanged() {
        let engine = engine();
        let first = engine.forecast(&revenue(), 5).unwrap();
        let second = engine.forecast(&revenue(), 5).unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_len(), 1);
        engine.forecast(&revenue(), 4).unwrap();
        assert_eq!(engine.cache_len(), 2);
    }

    #[test]
    fn parallel_run_matches_sequential_under_seed() {
        let parallel = ForecastingEngine::new(
            ForecastConfig {
                seed: Some(7),
                parallel: true,
                ..ForecastConfig::default()
            },
            &CacheConfig::default(),
        );
        let a = engine().forecast(&revenue(), 5).unwrap();
        let b = parallel.forecast(&revenue(), 5).unwrap();
        assert_eq!(a.predictions, b.predictions);
    }
}
