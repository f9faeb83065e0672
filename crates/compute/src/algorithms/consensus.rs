//! Reconcile several partitions of the same points by co-occurrence voting.

use spine_core::{AnalyticsError, ConsensusStrategy, Result};

use super::{relabel_consecutive, NOISE};

/// Dense n×n co-occurrence counts.
#[derive(Debug, Clone, PartialEq)]
pub struct CoOccurrence {
    counts: Vec<Vec<u32>>,
    members: usize,
}

impl CoOccurrence {
    /// Count, for every pair of points, how many partitions put both in the
    /// same (non-noise) cluster.
    pub fn build(partitions: &[&[i32]]) -> Result<Self> {
        let Some(first) = partitions.first() else {
            return Err(AnalyticsError::invalid("consensus needs at least one partition"));
        };
        let n = first.len();
        if partitions.iter().any(|p| p.len() != n) {
            return Err(AnalyticsError::invalid(
                "partitions disagree on the number of points",
            ));
        }

        let mut counts = vec![vec![0u32; n]; n];
        for labels in partitions {
            for i in 0..n {
                if labels[i] == NOISE {
                    continue;
                }
                for j in (i + 1)..n {
                    if labels[i] == labels[j] {
                        counts[i][j] += 1;
                        counts[j][i] += 1;
                    }
                }
            }
        }

        Ok(Self {
            counts,
            members: partitions.len(),
        })
    }

    pub fn count(&self, i: usize, j: usize) -> u32 {
        self.counts[i][j]
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Strictly more than half the ensemble agrees the pair belongs together.
    pub fn is_majority(&self, i: usize, j: usize) -> bool {
        f64::from(self.counts[i][j]) > self.members as f64 / 2.0
    }
}

/// Combine partitions into one consecutive labelling with no noise.
pub fn combine(partitions: &[&[i32]], strategy: ConsensusStrategy) -> Result<Vec<i32>> {
    let co = CoOccurrence::build(partitions)?;
    Ok(match strategy {
        ConsensusStrategy::Greedy => greedy(&co),
        ConsensusStrategy::ConnectedComponents => connected_components(&co),
    })
}

/// In row order, join the first cluster whose representative (its first
/// member) agrees by majority; otherwise open a new cluster.
fn greedy(co: &CoOccurrence) -> Vec<i32> {
    let mut representatives: Vec<usize> = Vec::new();
    let mut labels = vec![NOISE; co.len()];

    for i in 0..co.len() {
        let joined = representatives
            .iter()
            .position(|&rep| co.is_majority(i, rep));
        labels[i] = match joined {
            Some(c) => c as i32,
            None => {
                representatives.push(i);
                (representatives.len() - 1) as i32
            }
        };
    }
    labels
}

/// Clusters are the connected components of the majority-edge graph,
/// numbered by their first member.
fn connected_components(co: &CoOccurrence) -> Vec<i32> {
    let n = co.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if co.is_majority(i, j) {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    // Keep the smaller index as root so roots are stable.
                    parent[ri.max(rj)] = ri.min(rj);
                }
            }
        }
    }

    let roots: Vec<i32> = (0..n).map(|i| find(&mut parent, i) as i32).collect();
    relabel_consecutive(&roots)
}
