//! Clustering estimators, consensus, quality scoring and the shared
//! distance/statistics helpers they are built on.

pub mod consensus;
pub mod dbscan;
pub mod distance;
pub mod hierarchical;
pub mod kmeans;
pub mod quality;
pub mod stats;

/// Label reserved for points no cluster claims (DBSCAN noise).
pub const NOISE: i32 = -1;

/// Raw output shared by every clustering estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// One label per input row; [`NOISE`] for unassigned points.
    pub labels: Vec<i32>,
    /// Mean of each non-empty cluster, indexed by label.
    pub centroids: Vec<Vec<f64>>,
}

impl Partition {
    /// Build a partition from labels, remapping them to `0..k` in order of
    /// first appearance and recomputing centroids from `points`.
    pub fn from_labels(points: &[Vec<f64>], labels: &[i32]) -> Self {
        let labels = relabel_consecutive(labels);
        let k = num_clusters(&labels);
        let mut members: Vec<Vec<&[f64]>> = vec![Vec::new(); k];
        for (point, &label) in points.iter().zip(&labels) {
            if label != NOISE {
                members[label as usize].push(point);
            }
        }
        let centroids = members.iter().map(|m| distance::centroid(m)).collect();
        Self { labels, centroids }
    }

    pub fn num_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Point count per cluster (noise excluded).
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &label in &self.labels {
            if label != NOISE {
                sizes[label as usize] += 1;
            }
        }
        sizes
    }

    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }
}

/// Remap labels to a consecutive range in order of first appearance.
/// Noise stays noise.
pub fn relabel_consecutive(labels: &[i32]) -> Vec<i32> {
    let mut mapping: std::collections::HashMap<i32, i32> = std::collections::HashMap::new();
    labels
        .iter()
        .map(|&label| {
            if label == NOISE {
                return NOISE;
            }
            let next = mapping.len() as i32;
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

/// Number of distinct non-noise labels, assuming consecutive labels.
fn num_clusters(labels: &[i32]) -> usize {
    labels.iter().copied().max().map_or(0, |m| (m + 1).max(0) as usize)
}
