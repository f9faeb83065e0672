use spine_core::{AnalyticsError, FeatureMatrix, Result};

/// Euclidean distance between two vectors of equal length.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(AnalyticsError::invalid(format!(
            "vector lengths differ: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(euclidean(a, b))
}

/// Squared Euclidean distance. Callers guarantee equal lengths.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance without the length check, for validated matrices.
#[inline]
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Per-dimension arithmetic mean. Empty input yields an empty vector.
pub fn centroid<P: AsRef<[f64]>>(points: &[P]) -> Vec<f64> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let dim = first.as_ref().len();
    let mut sum = vec![0.0; dim];
    for p in points {
        for (acc, v) in sum.iter_mut().zip(p.as_ref()) {
            *acc += v;
        }
    }
    let n = points.len() as f64;
    sum.iter_mut().for_each(|v| *v /= n);
    sum
}

/// Min-max scale every column to [0, 1].
///
/// A constant column maps to 0 for every row.
pub fn normalize_features(matrix: &FeatureMatrix) -> FeatureMatrix {
    let cols = matrix.n_cols();
    let mut mins = vec![f64::INFINITY; cols];
    let mut maxs = vec![f64::NEG_INFINITY; cols];
    for row in matrix.rows() {
        for (j, &v) in row.iter().enumerate() {
            mins[j] = mins[j].min(v);
            maxs[j] = maxs[j].max(v);
        }
    }

    let rows = matrix
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(j, &v)| {
                    let range = maxs[j] - mins[j];
                    let denom = if range > 0.0 { range } else { 1.0 };
                    (v - mins[j]) / denom
                })
                .collect()
        })
        .collect();

    // Shape and finiteness are preserved, so this cannot fail.
    FeatureMatrix::new(rows).unwrap_or_else(|_| matrix.clone())
}

/// Full symmetric pairwise distance matrix.
pub(crate) fn pairwise_distances(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&points[i], &points[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 6.0, 3.0];
        assert_eq!(euclidean_distance(&a, &b).unwrap(), 5.0);
        assert_eq!(
            euclidean_distance(&a, &b).unwrap(),
            euclidean_distance(&b, &a).unwrap()
        );
        assert_eq!(euclidean_distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn mismatched_lengths_fail_fast() {
        let err = euclidean_distance(&[1.0], &[1.0, 2.0]).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn centroid_of_points() {
        let points = vec![vec![0.0, 0.0], vec![2.0, 4.0]];
        assert_eq!(centroid(&points), vec![1.0, 2.0]);
        let empty: Vec<Vec<f64>> = Vec::new();
        assert!(centroid(&empty).is_empty());
    }

    #[test]
    fn normalize_scales_columns_and_zeroes_constant_ones() {
        let m = FeatureMatrix::new(vec![vec![1.0, 5.0], vec![3.0, 5.0], vec![2.0, 5.0]]).unwrap();
        let n = normalize_features(&m);
        assert_eq!(n.column(0), vec![0.0, 1.0, 0.5]);
        assert_eq!(n.column(1), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn pairwise_matrix_is_symmetric() {
        let points = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        let d = pairwise_distances(&points);
        assert_eq!(d[0][1], 5.0);
        assert_eq!(d[1][0], 5.0);
        assert_eq!(d[0][2], 10.0);
        assert_eq!(d[2][2], 0.0);
    }
}
