use std::time::Instant;

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use spine_core::{AnalyticsError, CacheConfig, ClusteringConfig, FeatureMatrix, Result};

use super::SeededRng;
use crate::algorithms::dbscan::{dbscan, DbscanParams};
use crate::algorithms::distance::normalize_features;
use crate::algorithms::kmeans::{kmeans, optimal_kmeans};
use crate::algorithms::{consensus, hierarchical, Partition};
use crate::cache::{cache_key, ResultCache};
use crate::segments::{characterize, DomainFeatureSet, SegmentRegistry, UserSegment};
use crate::types::{ClusterResult, ClusteringMethod};

const ENSEMBLE_CONTEXT: &str = "Ensemble clustering failed";

/// What to cluster with. `num_clusters: None` selects k by silhouette.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterRequest {
    pub num_clusters: Option<usize>,
    pub method: ClusteringMethod,
}

impl ClusterRequest {
    pub fn ensemble(num_clusters: usize) -> Self {
        Self {
            num_clusters: Some(num_clusters),
            method: ClusteringMethod::Ensemble,
        }
    }

    pub fn method(method: ClusteringMethod, num_clusters: Option<usize>) -> Self {
        Self {
            num_clusters,
            method,
        }
    }
}

/// Runs k-means, hierarchical and DBSCAN and reconciles them by consensus.
pub struct ClusteringEngine {
    config: ClusteringConfig,
    cache: ResultCache<ClusterResult>,
    rng: SeededRng,
}

impl ClusteringEngine {
    /// Cluster results never expire; they are only dropped by
    /// [`clear_cache`](Self::clear_cache) or LRU eviction.
    pub fn new(config: ClusteringConfig, cache: &CacheConfig) -> Self {
        let rng = SeededRng::new(config.seed);
        let cache = if cache.enabled {
            ResultCache::new("clustering", cache.capacity, None)
        } else {
            ResultCache::disabled("clustering")
        };
        Self { config, cache, rng }
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Ensemble clustering into `num_clusters` groups (or an automatic k).
    pub fn cluster(
        &self,
        matrix: &FeatureMatrix,
        num_clusters: Option<usize>,
    ) -> Result<ClusterResult> {
        self.cluster_with(
            matrix,
            &ClusterRequest::method(ClusteringMethod::Ensemble, num_clusters),
        )
    }

    pub fn cluster_with(
        &self,
        matrix: &FeatureMatrix,
        request: &ClusterRequest,
    ) -> Result<ClusterResult> {
        validate(matrix, request.num_clusters)?;

        let flat: Vec<f64> = matrix.rows().iter().flatten().copied().collect();
        let key = cache_key(
            &flat,
            matrix.n_rows(),
            &(request, matrix.n_cols(), &self.config),
        );
        if let Some(hit) = self.cache.get(&key)? {
            debug!(method = %request.method, rows = matrix.n_rows(), "returning cached clustering");
            return Ok(hit);
        }

        let start = Instant::now();
        let points = if self.config.normalize {
            normalize_features(matrix).into_rows()
        } else {
            matrix.rows().to_vec()
        };
        let mut rng = self.rng.child()?;

        let partition = match request.method {
            ClusteringMethod::KMeans => {
                let k = self.resolve_k(&points, request.num_clusters, &mut rng)?;
                self.run_kmeans(&points, k, &mut rng)?
            }
            ClusteringMethod::Hierarchical => {
                let k = self.resolve_k(&points, request.num_clusters, &mut rng)?;
                hierarchical::agglomerative(&points, k)?
            }
            ClusteringMethod::Dbscan => self.run_dbscan(&points)?,
            ClusteringMethod::Ensemble => self
                .run_ensemble(&points, request.num_clusters, &mut rng)
                .map_err(|e| e.in_ensemble(ENSEMBLE_CONTEXT))?,
        };

        let result = ClusterResult::from_partition(&points, partition, request.method);
        info!(
            "Clustering ({}): {} rows, {} clusters, {} noise, silhouette={:.3}, quality={:.3} ({:.1}ms)",
            request.method,
            matrix.n_rows(),
            result.num_clusters,
            result.noise_count,
            result.silhouette_score,
            result.quality,
            start.elapsed().as_secs_f64() * 1000.0
        );

        self.cache.insert(key, result.clone())?;
        Ok(result)
    }

    /// Cluster, characterize each cluster for `features.domain`, and replace
    /// that domain's segments in `registry`.
    pub fn segment(
        &self,
        matrix: &FeatureMatrix,
        features: &DomainFeatureSet,
        request: &ClusterRequest,
        registry: &mut SegmentRegistry,
    ) -> Result<Vec<UserSegment>> {
        features.validate(matrix.n_cols())?;
        let result = self.cluster_with(matrix, request)?;
        let segments = characterize(matrix, &result, features)?;
        registry.replace_domain(&features.domain, segments.clone());
        info!(
            domain = %features.domain,
            segments = segments.len(),
            "segmentation complete"
        );
        Ok(segments)
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    // ── Estimators ───────────────────────────────────────────

    fn run_ensemble(
        &self,
        points: &[Vec<f64>],
        num_clusters: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<Partition> {
        let k = self.resolve_k(points, num_clusters, rng)?;

        let (kmeans_result, (hier_result, dbscan_result)) = if self.config.parallel {
            rayon::join(
                || self.run_kmeans(points, k, rng),
                || {
                    rayon::join(
                        || hierarchical::agglomerative(points, k),
                        || self.run_dbscan(points),
                    )
                },
            )
        } else {
            (
                self.run_kmeans(points, k, rng),
                (hierarchical::agglomerative(points, k), self.run_dbscan(points)),
            )
        };
        let members = [kmeans_result?, hier_result?, dbscan_result?];

        for (name, p) in ["kmeans", "hierarchical", "dbscan"].iter().zip(&members) {
            debug!(
                estimator = name,
                clusters = p.num_clusters(),
                noise = p.noise_count(),
                "ensemble member finished"
            );
        }

        let labels: Vec<&[i32]> = members.iter().map(|p| p.labels.as_slice()).collect();
        let consensus = consensus::combine(&labels, self.config.consensus)?;
        Ok(Partition::from_labels(points, &consensus))
    }

    fn run_kmeans(&self, points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Result<Partition> {
        let result = kmeans(
            points,
            k,
            self.config.max_iterations,
            self.config.convergence_tolerance,
            rng,
        )?;
        debug!(
            k,
            iterations = result.iterations,
            inertia = result.inertia,
            "kmeans finished"
        );
        Ok(result.into_partition(points))
    }

    fn run_dbscan(&self, points: &[Vec<f64>]) -> Result<Partition> {
        let params = DbscanParams::estimate(
            points,
            self.config.dbscan_sample_size,
            self.config.dbscan_eps_percentile,
            self.config.dbscan_min_pts_floor,
        )?;
        debug!(eps = params.eps, min_pts = params.min_pts, "dbscan parameters");
        Ok(dbscan(points, params.eps, params.min_pts))
    }

    /// Caller's k, or the silhouette-best k in `2..=min(max_auto_k, n-1)`.
    fn resolve_k(
        &self,
        points: &[Vec<f64>],
        requested: Option<usize>,
        rng: &mut StdRng,
    ) -> Result<usize> {
        if let Some(k) = requested {
            return Ok(k);
        }
        let upper = self.config.max_auto_k.min(points.len() - 1);
        if upper < 2 {
            return Ok(1);
        }
        let (k, _) = optimal_kmeans(
            points,
            2..=upper,
            self.config.max_iterations,
            self.config.convergence_tolerance,
            rng,
        )?;
        debug!(k, "selected k by silhouette");
        Ok(k)
    }
}

fn validate(matrix: &FeatureMatrix, num_clusters: Option<usize>) -> Result<()> {
    let n = matrix.n_rows();
    if n < 2 {
        return Err(AnalyticsError::invalid(format!(
            "clustering needs at least 2 rows, got {}",
            n
        )));
    }
    if matrix.n_cols() < 2 {
        return Err(AnalyticsError::invalid(format!(
            "clustering needs at least 2 feature columns, got {}",
            matrix.n_cols()
        )));
    }
    match num_clusters {
        Some(0) => Err(AnalyticsError::invalid("num_clusters must be at least 1")),
        Some(k) if k >= n => Err(AnalyticsError::invalid(format!(
            "num_clusters ({}) must be smaller than the number of points ({})",
            k, n
        ))),
        _ => Ok(()),
    }
}
