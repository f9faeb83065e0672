use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Rows are entities, columns are features.
///
/// Construction validates the shape once so the algorithms can index freely:
/// at least one row, every row the same non-zero length, all values finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct FeatureMatrix {
    rows: Vec<Vec<f64>>,
    cols: usize,
}

impl FeatureMatrix {
    pub fn new(rows: Vec<Vec<f64>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(AnalyticsError::invalid("feature matrix has no rows"));
        };
        let cols = first.len();
        if cols == 0 {
            return Err(AnalyticsError::invalid("feature vectors must not be empty"));
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(AnalyticsError::invalid(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    cols
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(AnalyticsError::invalid(format!(
                    "row {} contains a non-finite value",
                    i
                )));
            }
        }

        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.rows[i]
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// Values of one feature column, top to bottom.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }
}

impl TryFrom<Vec<Vec<f64>>> for FeatureMatrix {
    type Error = AnalyticsError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<FeatureMatrix> for Vec<Vec<f64>> {
    fn from(m: FeatureMatrix) -> Self {
        m.rows
    }
}
