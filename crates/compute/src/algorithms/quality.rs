use serde::{Deserialize, Serialize};

use super::distance::{euclidean, squared_euclidean};
use super::{Partition, NOISE};

/// Internal quality measures of a partition; no ground truth needed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// In [-1, 1], higher is better.
    pub silhouette: f64,
    /// ≥ 0, lower is better.
    pub davies_bouldin: f64,
    pub inertia: f64,
    /// Composite score in [0, 1].
    pub quality: f64,
}

impl QualityReport {
    pub fn evaluate(points: &[Vec<f64>], partition: &Partition) -> Self {
        let silhouette = silhouette_score(points, partition);
        let davies_bouldin = davies_bouldin_index(points, partition);
        Self {
            silhouette,
            davies_bouldin,
            inertia: inertia(points, partition),
            quality: composite_quality(silhouette, davies_bouldin),
        }
    }
}

/// Centroid-based silhouette.
///
/// For each clustered point, `a` is the distance to its own centroid and `b`
/// the distance to the nearest other centroid; the point scores
/// `(b - a) / max(a, b)`. Noise is skipped. A single cluster scores 0.
pub fn silhouette_score(points: &[Vec<f64>], partition: &Partition) -> f64 {
    if partition.num_clusters() < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    let mut counted = 0usize;
    for (point, &label) in points.iter().zip(&partition.labels) {
        if label == NOISE {
            continue;
        }
        let own = label as usize;
        let a = euclidean(point, &partition.centroids[own]);
        let b = partition
            .centroids
            .iter()
            .enumerate()
            .filter(|(c, _)| *c != own)
            .map(|(_, centroid)| euclidean(point, centroid))
            .fold(f64::INFINITY, f64::min);

        let max_ab = a.max(b);
        total += if max_ab > 0.0 { (b - a) / max_ab } else { 0.0 };
        counted += 1;
    }

    if counted == 0 {
        0.0
    } else {
        (total / counted as f64).clamp(-1.0, 1.0)
    }
}

/// Davies–Bouldin index: mean over clusters of the worst
/// `(s_i + s_j) / d(c_i, c_j)`, where `s` is the mean member-to-centroid
/// distance. Coincident centroids are skipped. Fewer than two clusters score 0.
pub fn davies_bouldin_index(points: &[Vec<f64>], partition: &Partition) -> f64 {
    let k = partition.num_clusters();
    if k < 2 {
        return 0.0;
    }

    let mut scatter = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (point, &label) in points.iter().zip(&partition.labels) {
        if label == NOISE {
            continue;
        }
        let c = label as usize;
        scatter[c] += euclidean(point, &partition.centroids[c]);
        counts[c] += 1;
    }
    for (s, &n) in scatter.iter_mut().zip(&counts) {
        if n > 0 {
            *s /= n as f64;
        }
    }

    let mut total = 0.0;
    for i in 0..k {
        let worst = (0..k)
            .filter(|&j| j != i)
            .filter_map(|j| {
                let d = euclidean(&partition.centroids[i], &partition.centroids[j]);
                (d > 0.0).then(|| (scatter[i] + scatter[j]) / d)
            })
            .fold(0.0, f64::max);
        total += worst;
    }
    total / k as f64
}

/// Sum of squared distances from each clustered point to its centroid.
pub fn inertia(points: &[Vec<f64>], partition: &Partition) -> f64 {
    points
        .iter()
        .zip(&partition.labels)
        .filter(|&(_, &label)| label != NOISE)
        .map(|(point, &label)| squared_euclidean(point, &partition.centroids[label as usize]))
        .sum()
}

/// `0.5 × silhouette mapped to [0, 1] + 0.5 × max(0, 1 − DB/3)`.
pub fn composite_quality(silhouette: f64, davies_bouldin: f64) -> f64 {
    let sil = (silhouette.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let db = (1.0 - davies_bouldin / 3.0).max(0.0);
    (0.5 * sil + 0.5 * db).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> (Vec<Vec<f64>>, Partition) {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.2, 0.0],
            vec![0.0, 0.2],
            vec![10.0, 10.0],
            vec![10.2, 10.0],
            vec![10.0, 10.2],
        ];
        let partition = Partition::from_labels(&points, &[0, 0, 0, 1, 1, 1]);
        (points, partition)
    }

    #[test]
    fn well_separated_blobs_score_high() {
        let (points, partition) = two_blobs();
        let report = QualityReport::evaluate(&points, &partition);
        assert!(report.silhouette > 0.9, "silhouette = {}", report.silhouette);
        assert!(report.davies_bouldin < 0.1, "db = {}", report.davies_bouldin);
        assert!(report.quality > 0.9 && report.quality <= 1.0);
    }

    #[test]
    fn bad_partition_scores_lower() {
        let (points, good) = two_blobs();
        let bad = Partition::from_labels(&points, &[0, 1, 0, 1, 0, 1]);
        let good_q = QualityReport::evaluate(&points, &good).quality;
        let bad_q = QualityReport::evaluate(&points, &bad).quality;
        assert!(bad_q < good_q, "bad {} vs good {}", bad_q, good_q);
    }

    #[test]
    fn single_cluster_is_neutral() {
        let (points, _) = two_blobs();
        let one = Partition::from_labels(&points, &[0; 6]);
        assert_eq!(silhouette_score(&points, &one), 0.0);
        assert_eq!(davies_bouldin_index(&points, &one), 0.0);
        assert!((composite_quality(0.0, 0.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn inertia_matches_hand_computation() {
        let points = vec![vec![0.0], vec![2.0], vec![10.0]];
        let partition = Partition::from_labels(&points, &[0, 0, NOISE]);
        // Centroid 1.0; noise excluded.
        assert!((inertia(&points, &partition) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn composite_stays_in_unit_interval() {
        for &(s, db) in &[(-1.0, 100.0), (1.0, 0.0), (0.3, 1.5), (-0.2, 2.9)] {
            let q = composite_quality(s, db);
            assert!((0.0..=1.0).contains(&q), "q = {}", q);
        }
        assert_eq!(composite_quality(-1.0, 10.0), 0.0);
        assert_eq!(composite_quality(1.0, 0.0), 1.0);
    }
}
