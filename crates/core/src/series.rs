use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Chronological, evenly spaced observations of a single metric.
///
/// Only sequence position matters; no timestamps are carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(AnalyticsError::invalid("time series is empty"));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(AnalyticsError::invalid(format!(
                "observation {} is not finite",
                pos
            )));
        }
        Ok(Self { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> f64 {
        // Non-empty by construction.
        self.values[self.values.len() - 1]
    }

    /// The last `n` observations (all of them if `n` exceeds the length).
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(n);
        &self.values[start..]
    }
}

impl TryFrom<Vec<f64>> for TimeSeries {
    type Error = AnalyticsError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::new(values)
    }
}

impl From<TimeSeries> for Vec<f64> {
    fn from(s: TimeSeries) -> Self {
        s.values
    }
}
