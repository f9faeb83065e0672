use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;
use spine_core::Result;

use super::ensemble::normalize_weights;
use super::models::{self, ModelParams};
use crate::algorithms::stats::error_metrics;
use crate::types::ForecastMethod;

/// Lower bound on tracked errors so a perfect back-test cannot produce an
/// infinite weight.
const ERROR_FLOOR: f64 = 1e-6;

/// Exponentially-weighted back-test error per method, carried across calls.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceTracker {
    errors: HashMap<ForecastMethod, f64>,
    observations: HashMap<ForecastMethod, u64>,
    smoothing: f64,
}

impl PerformanceTracker {
    pub fn new(smoothing: f64) -> Self {
        Self {
            errors: HashMap::new(),
            observations: HashMap::new(),
            smoothing: smoothing.clamp(f64::EPSILON, 1.0),
        }
    }

    /// Fold a new error observation into the method's running error.
    pub fn record(&mut self, method: ForecastMethod, error: f64) {
        let count = self.observations.entry(method).or_default();
        *count += 1;
        let tracked = self.errors.entry(method).or_insert(error);
        if *count > 1 {
            *tracked += self.smoothing * (error - *tracked);
        }
    }

    pub fn error(&self, method: ForecastMethod) -> Option<f64> {
        self.errors.get(&method).copied()
    }

    pub fn observations(&self, method: ForecastMethod) -> u64 {
        self.observations.get(&method).copied().unwrap_or(0)
    }

    /// Inverse-error weights for `methods`, normalized to sum to 1.
    ///
    /// Untracked methods are assumed to perform at the average tracked
    /// error; with nothing tracked every method gets `1/n`.
    pub fn weights(&self, methods: &[ForecastMethod]) -> Vec<f64> {
        let tracked: Vec<f64> = methods.iter().filter_map(|m| self.error(*m)).collect();
        if tracked.is_empty() {
            return normalize_weights(&vec![1.0; methods.len()]);
        }
        let fallback = tracked.iter().sum::<f64>() / tracked.len() as f64;

        let raw: Vec<f64> = methods
            .iter()
            .map(|m| 1.0 / self.error(*m).unwrap_or(fallback).max(ERROR_FLOOR))
            .collect();
        normalize_weights(&raw)
    }

    pub fn reset(&mut self) {
        self.errors.clear();
        self.observations.clear();
    }
}

/// Number of trailing observations held out for back-testing, or `None`
/// when the remaining prefix is too short for some member.
pub fn holdout_len(len: usize, horizon: usize, methods: &[ForecastMethod]) -> Option<usize> {
    let holdout = horizon.min(len / 4).max(1);
    let needed = methods.iter().map(|m| models::min_length(*m)).max().unwrap_or(1);
    (len > holdout && len - holdout >= needed).then_some(holdout)
}

/// Fit every method on the series minus its tail and measure the MAE on
/// the held-out tail, relative to the tail's mean absolute value so errors
/// from series of different magnitudes are comparable.
/// `Ok(None)` when the series is too short to split.
pub fn backtest<R: Rng + ?Sized>(
    series: &[f64],
    horizon: usize,
    methods: &[ForecastMethod],
    params: &ModelParams,
    rng: &mut R,
) -> Result<Option<Vec<(ForecastMethod, f64)>>> {
    let Some(holdout) = holdout_len(series.len(), horizon, methods) else {
        return Ok(None);
    };
    let (train, actual) = series.split_at(series.len() - holdout);
    let scale = mean_abs(actual);

    let mut errors = Vec::with_capacity(methods.len());
    for &method in methods {
        let predicted = models::forecast(method, train, holdout, params, rng)?;
        errors.push((method, error_metrics(actual, &predicted).mae / scale));
    }
    Ok(Some(errors))
}

/// Mean absolute value, or 1 for an all-zero sample.
fn mean_abs(values: &[f64]) -> f64 {
    let m = values.iter().map(|v| v.abs()).sum::<f64>() / values.len().max(1) as f64;
    if m > f64::EPSILON {
        m
    } else {
        1.0
    }
}
