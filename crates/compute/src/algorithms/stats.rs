use serde::{Deserialize, Serialize};

use spine_core::{AnalyticsError, Result};

/// Shortest series [`extract_seasonality`] accepts.
pub const MIN_SEASONAL_LEN: usize = 4;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile (`q` in [0, 1]) of an unsorted sample: the sorted element at
/// index `floor(q × n)`, clamped to the last one. For `q = 0.9` and ten
/// values this is the maximum.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = ((q.clamp(0.0, 1.0) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Ordinary least-squares slope of value against index.
pub fn calculate_trend(series: &[f64]) -> f64 {
    let n = series.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(series);

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in series.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den > 0.0 { num / den } else { 0.0 }
}

/// Period used for seasonality extraction: `max(4, len / 4)`.
pub fn seasonal_period(len: usize) -> usize {
    MIN_SEASONAL_LEN.max(len / 4)
}

/// De-meaned average value at each phase of the estimated period.
pub fn extract_seasonality(series: &[f64]) -> Result<Vec<f64>> {
    if series.len() < MIN_SEASONAL_LEN {
        return Err(AnalyticsError::invalid(format!(
            "seasonality needs at least {} observations, got {}",
            MIN_SEASONAL_LEN,
            series.len()
        )));
    }

    let period = seasonal_period(series.len());
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, &v) in series.iter().enumerate() {
        sums[i % period] += v;
        counts[i % period] += 1;
    }

    let phase_means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let overall = mean(&phase_means);
    Ok(phase_means.iter().map(|m| m - overall).collect())
}

/// Forecast error metrics. MAPE is a percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub mape: f64,
}

/// Compare `predicted` against `actual` over their overlapping length.
///
/// MAPE skips terms whose actual value is exactly zero.
pub fn error_metrics(actual: &[f64], predicted: &[f64]) -> ErrorMetrics {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return ErrorMetrics::default();
    }

    let mut sq = 0.0;
    let mut abs = 0.0;
    let mut pct = 0.0;
    let mut pct_terms = 0usize;
    for (a, p) in actual.iter().zip(predicted).take(n) {
        let err = a - p;
        sq += err * err;
        abs += err.abs();
        if *a != 0.0 {
            pct += (err / a).abs();
            pct_terms += 1;
        }
    }

    ErrorMetrics {
        rmse: (sq / n as f64).sqrt(),
        mae: abs / n as f64,
        mape: if pct_terms > 0 { pct / pct_terms as f64 * 100.0 } else { 0.0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_of_a_line_is_its_slope() {
        let series: Vec<f64> = (0..10).map(|i| 3.0 + 2.0 * i as f64).collect();
        assert!((calculate_trend(&series) - 2.0).abs() < 1e-12);
        assert_eq!(calculate_trend(&[5.0]), 0.0);
    }

    #[test]
    fn trend_of_rising_revenue() {
        let series = [100.0, 102.0, 105.0, 103.0, 108.0, 110.0, 112.0, 115.0, 113.0, 118.0];
        let slope = calculate_trend(&series);
        assert!((slope - 159.0 / 82.5).abs() < 1e-9, "slope = {}", slope);
    }

    #[test]
    fn seasonality_is_demeaned() {
        let series = [1.0, 5.0, 1.0, 5.0, 1.0, 5.0, 1.0, 5.0];
        let seasonal = extract_seasonality(&series).unwrap();
        assert_eq!(seasonal.len(), 4);
        assert!((seasonal.iter().sum::<f64>()).abs() < 1e-12);
        assert!((seasonal[0] + 2.0).abs() < 1e-12);
        assert!((seasonal[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn seasonality_requires_four_points() {
        assert!(extract_seasonality(&[1.0, 2.0, 3.0]).unwrap_err().is_invalid_input());
    }

    #[test]
    fn period_grows_with_length() {
        assert_eq!(seasonal_period(10), 4);
        assert_eq!(seasonal_period(48), 12);
    }

    #[test]
    fn metrics_over_overlap_and_skip_zero_actuals() {
        let m = error_metrics(&[0.0, 10.0, 20.0], &[1.0, 12.0]);
        assert!((m.mae - 1.5).abs() < 1e-12);
        assert!((m.rmse - (2.5f64).sqrt()).abs() < 1e-12);
        // Only the 10 -> 12 term counts: 20%.
        assert!((m.mape - 20.0).abs() < 1e-12);
    }

    #[test]
    fn percentile_takes_floor_index() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(percentile(&values, 0.9), 10.0);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn std_dev_population() {
        assert!((std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.0).abs() < 1e-12);
    }
}
