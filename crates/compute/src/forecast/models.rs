use rand::Rng;
use spine_core::{AnalyticsError, ForecastConfig, Result};

use crate::algorithms::stats::{self, calculate_trend, extract_seasonality, std_dev};
use crate::types::ForecastMethod;

/// Tunables shared by the individual estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelParams {
    pub smoothing_alpha: f64,
    pub noise_scale: f64,
    pub window: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self::from(&ForecastConfig::default())
    }
}

impl From<&ForecastConfig> for ModelParams {
    fn from(config: &ForecastConfig) -> Self {
        Self {
            smoothing_alpha: config.smoothing_alpha,
            noise_scale: config.noise_scale,
            window: config.lstm_window,
        }
    }
}

/// Shortest series each estimator can run on.
pub fn min_length(method: ForecastMethod) -> usize {
    match method {
        ForecastMethod::Naive | ForecastMethod::ExponentialSmoothing | ForecastMethod::Lstm => 1,
        ForecastMethod::Arima => 2,
        ForecastMethod::Prophet => stats::MIN_SEASONAL_LEN,
        // Depends on the members; checked by the engine.
        ForecastMethod::Ensemble => 1,
    }
}

/// Run one estimator.
pub fn forecast<R: Rng + ?Sized>(
    method: ForecastMethod,
    series: &[f64],
    horizon: usize,
    params: &ModelParams,
    rng: &mut R,
) -> Result<Vec<f64>> {
    let needed = min_length(method);
    if series.len() < needed {
        return Err(AnalyticsError::invalid(format!(
            "{} needs at least {} observations, got {}",
            method,
            needed,
            series.len()
        )));
    }
    if horizon == 0 {
        return Err(AnalyticsError::invalid("horizon must be at least 1"));
    }

    match method {
        ForecastMethod::Arima => Ok(trend_with_noise(series, horizon, params.noise_scale, rng)),
        ForecastMethod::ExponentialSmoothing => {
            Ok(exponential_smoothing(series, horizon, params.smoothing_alpha))
        }
        ForecastMethod::Prophet => trend_with_seasonality(series, horizon),
        ForecastMethod::Lstm => Ok(weighted_history(series, horizon, params.window)),
        ForecastMethod::Naive => Ok(naive(series, horizon)),
        ForecastMethod::Ensemble => Err(AnalyticsError::invalid(
            "ensemble is not a single estimator",
        )),
    }
}

/// `last + trend × (i + 1)` plus zero-mean uniform noise whose total width
/// is `noise_scale` × the series' standard deviation.
pub fn trend_with_noise<R: Rng + ?Sized>(
    series: &[f64],
    horizon: usize,
    noise_scale: f64,
    rng: &mut R,
) -> Vec<f64> {
    let last = series[series.len() - 1];
    let trend = calculate_trend(series);
    let amplitude = noise_scale * std_dev(series);

    (0..horizon)
        .map(|i| {
            let noise = (rng.gen::<f64>() - 0.5) * amplitude;
            last + trend * (i + 1) as f64 + noise
        })
        .collect()
}

/// Smooth the whole series with factor `alpha`; every step repeats the
/// final smoothed level.
pub fn exponential_smoothing(series: &[f64], horizon: usize, alpha: f64) -> Vec<f64> {
    let level = series[1..]
        .iter()
        .fold(series[0], |level, &x| alpha * x + (1.0 - alpha) * level);
    vec![level; horizon]
}

/// `last + trend × (i + 1) + seasonal[i mod period]`.
pub fn trend_with_seasonality(series: &[f64], horizon: usize) -> Result<Vec<f64>> {
    let last = series[series.len() - 1];
    let trend = calculate_trend(series);
    let seasonal = extract_seasonality(series)?;
    let period = seasonal.len();

    Ok((0..horizon)
        .map(|i| last + trend * (i + 1) as f64 + seasonal[i % period])
        .collect())
}

/// Autoregressive weighted average over the last `min(window, len)` values.
///
/// Weights grow linearly towards the most recent value; each prediction is
/// pushed into the window before the next step.
pub fn weighted_history(series: &[f64], horizon: usize, window: usize) -> Vec<f64> {
    let size = window.min(series.len()).max(1);
    let mut history: Vec<f64> = series[series.len() - size..].to_vec();
    let total: f64 = (1..=size).map(|j| j as f64).sum();
    let weights: Vec<f64> = (1..=size).map(|j| j as f64 / total).collect();

    let mut predictions = Vec::with_capacity(horizon);
    for _ in 0..horizon {
        let next: f64 = history.iter().zip(&weights).map(|(v, w)| v * w).sum();
        predictions.push(next);
        history.remove(0);
        history.push(next);
    }
    predictions
}

pub fn naive(series: &[f64], horizon: usize) -> Vec<f64> {
    vec![series[series.len() - 1]; horizon]
}
