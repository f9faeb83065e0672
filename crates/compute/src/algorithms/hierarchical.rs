use spine_core::{AnalyticsError, Result};

use super::distance::pairwise_distances;
use super::Partition;

/// Agglomerative clustering with average linkage.
///
/// Starts from singletons and merges the closest pair of clusters until
/// exactly `k` remain. Linkage is the mean distance over all cross-cluster
/// point pairs, maintained incrementally (Lance–Williams) from the pairwise
/// matrix computed once up front. O(n²) memory, O(n³) time.
pub fn agglomerative(points: &[Vec<f64>], k: usize) -> Result<Partition> {
    let n = points.len();
    if k == 0 || k > n {
        return Err(AnalyticsError::invalid(format!(
            "hierarchical: k must be within 1..={}, got {}",
            n, k
        )));
    }

    let mut linkage = pairwise_distances(points);
    let mut sizes = vec![1usize; n];
    let mut active = vec![true; n];
    // Cluster id of each point; clusters are named after a surviving index.
    let mut owner: Vec<usize> = (0..n).collect();
    let mut remaining = n;

    while remaining > k {
        let Some((a, b)) = closest_pair(&linkage, &active) else {
            break;
        };

        // Merge b into a.
        let (size_a, size_b) = (sizes[a] as f64, sizes[b] as f64);
        for c in 0..n {
            if !active[c] || c == a || c == b {
                continue;
            }
            let merged = (size_a * linkage[a][c] + size_b * linkage[b][c]) / (size_a + size_b);
            linkage[a][c] = merged;
            linkage[c][a] = merged;
        }
        sizes[a] += sizes[b];
        active[b] = false;
        for o in owner.iter_mut() {
            if *o == b {
                *o = a;
            }
        }
        remaining -= 1;
    }

    let labels: Vec<i32> = owner.iter().map(|&o| o as i32).collect();
    Ok(Partition::from_labels(points, &labels))
}

/// Active pair with the smallest linkage; ties go to the lowest indices.
fn closest_pair(linkage: &[Vec<f64>], active: &[bool]) -> Option<(usize, usize)> {
    let n = active.len();
    let mut best: Option<(usize, usize)> = None;
    let mut best_dist = f64::INFINITY;
    for i in (0..n).filter(|&i| active[i]) {
        for j in ((i + 1)..n).filter(|&j| active[j]) {
            if linkage[i][j] < best_dist {
                best_dist = linkage[i][j];
                best = Some((i, j));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_two_groups() {
        let points = vec![
            vec![0.0, 0.0],
            vec![0.5, 0.2],
            vec![10.0, 10.0],
            vec![10.5, 9.8],
            vec![0.1, 0.4],
        ];
        let partition = agglomerative(&points, 2).unwrap();
        let l = &partition.labels;
        assert_eq!(partition.num_clusters(), 2);
        assert_eq!(l[0], l[1]);
        assert_eq!(l[0], l[4]);
        assert_eq!(l[2], l[3]);
        assert_ne!(l[0], l[2]);
    }

    #[test]
    fn k_equal_to_n_keeps_singletons() {
        let points = vec![vec![0.0], vec![1.0], vec![2.0]];
        let partition = agglomerative(&points, 3).unwrap();
        assert_eq!(partition.labels, vec![0, 1, 2]);
        assert_eq!(partition.sizes(), vec![1, 1, 1]);
    }

    #[test]
    fn single_cluster_centroid_is_global_mean() {
        let points = vec![vec![0.0], vec![2.0], vec![4.0]];
        let partition = agglomerative(&points, 1).unwrap();
        assert_eq!(partition.centroids, vec![vec![2.0]]);
    }

    #[test]
    fn average_linkage_prefers_compact_group() {
        // 1D: {0, 1} and {5, 6, 12}. Average linkage of {5,6} with 12 is
        // larger than {5,6} with each other, so 12 joins last.
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0], vec![12.0]];
        let partition = agglomerative(&points, 3).unwrap();
        let l = &partition.labels;
        assert_eq!(l[0], l[1]);
        assert_eq!(l[2], l[3]);
        assert_ne!(l[3], l[4]);
        assert_ne!(l[0], l[4]);
    }

    #[test]
    fn rejects_k_out_of_range() {
        let points = vec![vec![0.0], vec![1.0]];
        assert!(agglomerative(&points, 0).unwrap_err().is_invalid_input());
        assert!(agglomerative(&points, 3).unwrap_err().is_invalid_input());
    }
}
