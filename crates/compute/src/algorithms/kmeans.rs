use rand::Rng;
use spine_core::{AnalyticsError, Result};

use super::distance::squared_euclidean;
use super::{quality, Partition};

/// Result of a full batch K-means run.
#[derive(Debug, Clone)]
pub struct KmeansResult {
    /// Cluster index of each point, in input order.
    pub assignments: Vec<usize>,
    /// Final centroid vectors, indexed by cluster id.
    pub centroids: Vec<Vec<f64>>,
    /// Number of clusters.
    pub k: usize,
    /// Number of Lloyd's iterations performed.
    pub iterations: usize,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

impl KmeansResult {
    /// Convert to a [`Partition`], dropping clusters that ended up empty.
    pub fn into_partition(self, points: &[Vec<f64>]) -> Partition {
        let labels: Vec<i32> = self.assignments.iter().map(|&c| c as i32).collect();
        Partition::from_labels(points, &labels)
    }
}

/// Run Lloyd's K-means algorithm with K-means++ seeding.
///
/// Iterates until the fraction of points that changed cluster in an
/// iteration drops below `tolerance`, or `max_iterations` is reached.
/// Clusters that lose all their points keep their previous centroid.
pub fn kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Result<KmeansResult> {
    if points.is_empty() {
        return Err(AnalyticsError::invalid("kmeans: points must not be empty"));
    }
    if k == 0 {
        return Err(AnalyticsError::invalid("kmeans: k must be at least 1"));
    }
    if k > points.len() {
        return Err(AnalyticsError::invalid(format!(
            "kmeans: k ({}) exceeds number of points ({})",
            k,
            points.len()
        )));
    }

    let dim = points[0].len();
    let n = points.len();

    let mut centroids = kmeanspp_init(points, k, rng);

    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;

    for _ in 0..max_iterations {
        iterations += 1;

        // Assignment step.
        let mut changed = 0usize;
        for (i, vec) in points.iter().enumerate() {
            let nearest = nearest_centroid(vec, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed += 1;
            }
        }

        if (changed as f64 / n as f64) < tolerance {
            break;
        }

        // Update step: recompute centroids as mean of assigned points.
        let mut new_centroids = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];

        for (i, vec) in points.iter().enumerate() {
            let cluster = assignments[i];
            counts[cluster] += 1;
            for (j, &val) in vec.iter().enumerate() {
                new_centroids[cluster][j] += val;
            }
        }

        for (c, centroid) in new_centroids.iter_mut().enumerate() {
            if counts[c] > 0 {
                let count = counts[c] as f64;
                for val in centroid.iter_mut() {
                    *val /= count;
                }
            } else {
                // Empty cluster: keep previous centroid.
                centroid.clone_from(&centroids[c]);
            }
        }

        centroids = new_centroids;
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(vec, &c)| squared_euclidean(vec, &centroids[c]))
        .sum();

    Ok(KmeansResult {
        assignments,
        centroids,
        k,
        iterations,
        inertia,
    })
}

/// Run K-means for each K in `k_range` and return the partition with the
/// best silhouette score.
///
/// K values outside `2..n` are skipped. Falls back to k = 2 (or 1 for a
/// single point) when nothing in the range is usable.
pub fn optimal_kmeans<R: Rng + ?Sized>(
    points: &[Vec<f64>],
    k_range: std::ops::RangeInclusive<usize>,
    max_iterations: usize,
    tolerance: f64,
    rng: &mut R,
) -> Result<(usize, Partition)> {
    let mut best: Option<(usize, Partition)> = None;
    let mut best_score = f64::NEG_INFINITY;

    for k in k_range {
        if k < 2 || k >= points.len() {
            continue;
        }

        let partition = kmeans(points, k, max_iterations, tolerance, rng)?.into_partition(points);
        let score = quality::silhouette_score(points, &partition);

        if score > best_score {
            best_score = score;
            best = Some((k, partition));
        }
    }

    match best {
        Some(found) => Ok(found),
        None => {
            let k = 2.min(points.len());
            let partition = kmeans(points, k, max_iterations, tolerance, rng)?.into_partition(points);
            Ok((k, partition))
        }
    }
}

// ── Internal helpers ─────────────────────────────────────────

/// K-means++ initialization: first centroid uniform, each next one sampled
/// with probability proportional to D² to the nearest chosen centroid.
fn kmeanspp_init<R: Rng + ?Sized>(points: &[Vec<f64>], k: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].clone());

    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_euclidean(p, &centroids[0]))
        .collect();

    for _ in 1..k {
        let total: f64 = min_dist.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in min_dist.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            // Every point coincides with a centroid already.
            rng.gen_range(0..n)
        };

        let centroid = points[next].clone();
        for (d, p) in min_dist.iter_mut().zip(points) {
            *d = d.min(squared_euclidean(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Find the index of the nearest centroid.
fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best_idx = 0;
    let mut best_dist = f64::MAX;
    for (i, centroid) in centroids.iter().enumerate() {
        let dist = squared_euclidean(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = i;
        }
    }
    best_idx
}
