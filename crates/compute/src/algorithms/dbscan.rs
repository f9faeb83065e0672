use std::collections::VecDeque;

use spine_core::{AnalyticsError, Result};

use super::distance::{euclidean, squared_euclidean};
use super::stats::percentile;
use super::{Partition, NOISE};

/// Parameters for a DBSCAN run derived from the data itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_pts: usize,
}

impl DbscanParams {
    /// `eps` is the `quantile` of pairwise distances among the first
    /// `sample_size` points; `min_pts` is `max(min_pts_floor, floor(ln n))`.
    ///
    /// Fails when every sampled distance is zero, since no radius can then
    /// separate anything.
    pub fn estimate(
        points: &[Vec<f64>],
        sample_size: usize,
        quantile: f64,
        min_pts_floor: usize,
    ) -> Result<Self> {
        let sample = &points[..points.len().min(sample_size)];
        let mut distances = Vec::with_capacity(sample.len() * sample.len().saturating_sub(1) / 2);
        for i in 0..sample.len() {
            for j in (i + 1)..sample.len() {
                distances.push(euclidean(&sample[i], &sample[j]));
            }
        }

        let eps = percentile(&distances, quantile);
        if eps <= 0.0 {
            return Err(AnalyticsError::computation(
                "dbscan: degenerate distance matrix (all sampled distances are zero)",
            ));
        }

        let ln_n = (points.len() as f64).ln().floor().max(0.0) as usize;
        Ok(Self {
            eps,
            min_pts: min_pts_floor.max(ln_n),
        })
    }
}

/// Run DBSCAN density-based clustering.
///
/// # Arguments
/// * `points`: feature vectors
/// * `eps`: neighborhood radius (Euclidean distance)
/// * `min_pts`: minimum number of neighbors (including the point itself) to form a core point
///
/// Points that are not density-reachable from any core point are labelled [`NOISE`].
pub fn dbscan(points: &[Vec<f64>], eps: f64, min_pts: usize) -> Partition {
    let n = points.len();
    if n == 0 {
        return Partition {
            labels: Vec::new(),
            centroids: Vec::new(),
        };
    }

    let eps_sq = eps * eps;

    // Pre-compute pairwise neighbor lists to avoid redundant distance calculations.
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            (0..n)
                .filter(|&j| squared_euclidean(&points[i], &points[j]) <= eps_sq)
                .collect()
        })
        .collect();

    let mut labels: Vec<Option<i32>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut current_cluster: i32 = 0;

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        if neighbors[i].len() < min_pts {
            // Not a core point; tentatively noise (may be claimed by a cluster later).
            continue;
        }

        labels[i] = Some(current_cluster);

        let mut queue: VecDeque<usize> = neighbors[i]
            .iter()
            .copied()
            .filter(|&j| j != i)
            .collect();

        while let Some(j) = queue.pop_front() {
            if labels[j].is_none() {
                labels[j] = Some(current_cluster);
            }

            if visited[j] {
                continue;
            }
            visited[j] = true;

            if neighbors[j].len() >= min_pts {
                // j is also a core point: expand the cluster with its neighbors.
                for &nb in &neighbors[j] {
                    if labels[nb].is_none() {
                        queue.push_back(nb);
                    }
                }
            }
        }

        current_cluster += 1;
    }

    let labels: Vec<i32> = labels.iter().map(|l| l.unwrap_or(NOISE)).collect();
    Partition::from_labels(points, &labels)
}
