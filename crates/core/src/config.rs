use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub clustering: ClusteringConfig,
    pub forecast: ForecastConfig,
    pub cache: CacheConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SPINE_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SPINE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            clustering: ClusteringConfig::from_env_profiled(p),
            forecast: ForecastConfig::from_env_profiled(p),
            cache: CacheConfig::from_env_profiled(p),
        }
    }

    /// Reject settings the algorithms cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.clustering;
        if c.max_iterations == 0 {
            return Err(AnalyticsError::Config("max_iterations must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&c.dbscan_eps_percentile) {
            return Err(AnalyticsError::Config(
                "dbscan_eps_percentile must be within [0, 1]".into(),
            ));
        }
        if c.max_auto_k < 2 {
            return Err(AnalyticsError::Config("max_auto_k must be at least 2".into()));
        }

        let f = &self.forecast;
        if !(f.smoothing_alpha > 0.0 && f.smoothing_alpha <= 1.0) {
            return Err(AnalyticsError::Config("smoothing_alpha must be within (0, 1]".into()));
        }
        if !(f.adaptive_smoothing > 0.0 && f.adaptive_smoothing <= 1.0) {
            return Err(AnalyticsError::Config(
                "adaptive_smoothing must be within (0, 1]".into(),
            ));
        }
        if f.lstm_window == 0 {
            return Err(AnalyticsError::Config("lstm_window must be at least 1".into()));
        }
        if f.noise_scale < 0.0 || f.trend_threshold < 0.0 {
            return Err(AnalyticsError::Config(
                "noise_scale and trend_threshold must be non-negative".into(),
            ));
        }

        if self.cache.capacity == 0 {
            return Err(AnalyticsError::Config("cache capacity must be at least 1".into()));
        }
        if self.cache.forecast_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(AnalyticsError::Config(format!(
                "forecast_ttl_secs must be at most {}",
                MAX_CACHE_TTL_SECS
            )));
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  clustering:  max_iter={}, tol={}, consensus={:?}, seed={:?}, parallel={}",
            self.clustering.max_iterations,
            self.clustering.convergence_tolerance,
            self.clustering.consensus,
            self.clustering.seed,
            self.clustering.parallel
        );
        tracing::info!(
            "  forecast:    alpha={}, level={}, adaptive={}, seed={:?}",
            self.forecast.smoothing_alpha,
            self.forecast.confidence_level,
            self.forecast.adaptive,
            self.forecast.seed
        );
        tracing::info!(
            "  cache:       enabled={}, capacity={}, forecast_ttl={}s",
            self.cache.enabled,
            self.cache.capacity,
            self.cache.forecast_ttl_secs
        );
    }

    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "clustering": self.clustering,
            "forecast": self.forecast,
            "cache": self.cache,
        })
    }
}

// ── Clustering ────────────────────────────────────────────────

/// How the per-estimator partitions are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStrategy {
    /// Connected components over majority-vote edges. Order-insensitive.
    #[default]
    ConnectedComponents,
    /// Single pass in row order; a point joins the first cluster whose
    /// representative it agrees with.
    Greedy,
}

impl FromStr for ConsensusStrategy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "connected" | "connected_components" | "graph" => Ok(Self::ConnectedComponents),
            "greedy" => Ok(Self::Greedy),
            other => Err(AnalyticsError::Config(format!(
                "unknown consensus strategy: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Upper bound on Lloyd's iterations.
    pub max_iterations: usize,
    /// Stop once this fraction of points (or fewer) changed cluster.
    pub convergence_tolerance: f64,
    /// Number of leading points used to estimate DBSCAN's eps.
    pub dbscan_sample_size: usize,
    pub dbscan_eps_percentile: f64,
    /// Lower bound for DBSCAN's min_pts.
    pub dbscan_min_pts_floor: usize,
    pub consensus: ConsensusStrategy,
    /// Largest k tried when the caller leaves k open.
    pub max_auto_k: usize,
    /// Min-max scale features before clustering.
    pub normalize: bool,
    pub seed: Option<u64>,
    pub parallel: bool,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            convergence_tolerance: 0.001,
            dbscan_sample_size: 100,
            dbscan_eps_percentile: 0.9,
            dbscan_min_pts_floor: 3,
            consensus: ConsensusStrategy::default(),
            max_auto_k: 10,
            normalize: true,
            seed: None,
            parallel: false,
        }
    }
}

impl ClusteringConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            max_iterations: profiled_env_parse(p, "CLUSTER_MAX_ITERATIONS", d.max_iterations),
            convergence_tolerance: profiled_env_parse(
                p,
                "CLUSTER_CONVERGENCE_TOLERANCE",
                d.convergence_tolerance,
            ),
            dbscan_sample_size: profiled_env_parse(p, "CLUSTER_DBSCAN_SAMPLE", d.dbscan_sample_size),
            dbscan_eps_percentile: profiled_env_parse(
                p,
                "CLUSTER_DBSCAN_PERCENTILE",
                d.dbscan_eps_percentile,
            ),
            dbscan_min_pts_floor: profiled_env_parse(
                p,
                "CLUSTER_DBSCAN_MIN_PTS",
                d.dbscan_min_pts_floor,
            ),
            consensus: profiled_env_parse(p, "CLUSTER_CONSENSUS", d.consensus),
            max_auto_k: profiled_env_parse(p, "CLUSTER_MAX_AUTO_K", d.max_auto_k),
            normalize: profiled_env_bool(p, "CLUSTER_NORMALIZE", d.normalize),
            seed: profiled_env_opt(p, "ANALYTICS_SEED").and_then(|v| v.parse().ok()),
            parallel: profiled_env_bool(p, "ANALYTICS_PARALLEL", d.parallel),
        }
    }
}

// ── Forecasting ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Exponential smoothing factor.
    pub smoothing_alpha: f64,
    /// Noise amplitude of the trend+noise forecaster, as a fraction of the
    /// series' standard deviation.
    pub noise_scale: f64,
    /// Window length of the weighted-history forecaster.
    pub lstm_window: usize,
    /// Two-sided interval level (0.90, 0.95 or 0.99).
    pub confidence_level: f64,
    /// Relative change between first and last prediction that counts as a trend.
    pub trend_threshold: f64,
    /// Weight members by tracked back-test error instead of static weights.
    pub adaptive: bool,
    /// Smoothing factor for the tracked per-method error.
    pub adaptive_smoothing: f64,
    pub seed: Option<u64>,
    pub parallel: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.3,
            noise_scale: 0.1,
            lstm_window: 10,
            confidence_level: 0.95,
            trend_threshold: 0.05,
            adaptive: false,
            adaptive_smoothing: 0.3,
            seed: None,
            parallel: false,
        }
    }
}

impl ForecastConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            smoothing_alpha: profiled_env_parse(p, "FORECAST_SMOOTHING_ALPHA", d.smoothing_alpha),
            noise_scale: profiled_env_parse(p, "FORECAST_NOISE_SCALE", d.noise_scale),
            lstm_window: profiled_env_parse(p, "FORECAST_WINDOW", d.lstm_window),
            confidence_level: profiled_env_parse(
                p,
                "FORECAST_CONFIDENCE_LEVEL",
                d.confidence_level,
            ),
            trend_threshold: profiled_env_parse(p, "FORECAST_TREND_THRESHOLD", d.trend_threshold),
            adaptive: profiled_env_bool(p, "FORECAST_ADAPTIVE", d.adaptive),
            adaptive_smoothing: profiled_env_parse(
                p,
                "FORECAST_ADAPTIVE_SMOOTHING",
                d.adaptive_smoothing,
            ),
            seed: profiled_env_opt(p, "ANALYTICS_SEED").and_then(|v| v.parse().ok()),
            parallel: profiled_env_bool(p, "ANALYTICS_PARALLEL", d.parallel),
        }
    }
}

// ── Cache ─────────────────────────────────────────────────────

/// Longest TTL a timestamp delta can represent (millisecond precision in i64).
pub const MAX_CACHE_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Maximum entries per engine cache (LRU eviction beyond this).
    pub capacity: usize,
    /// Forecast results older than this are recomputed.
    pub forecast_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 256,
            forecast_ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            enabled: profiled_env_bool(p, "CACHE_ENABLED", d.enabled),
            capacity: profiled_env_parse(p, "CACHE_CAPACITY", d.capacity),
            forecast_ttl_secs: profiled_env_parse(p, "FORECAST_CACHE_TTL_SECS", d.forecast_ttl_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.clustering.max_iterations, 100);
        assert!((config.clustering.convergence_tolerance - 0.001).abs() < 1e-12);
        assert_eq!(config.clustering.dbscan_sample_size, 100);
        assert_eq!(config.clustering.consensus, ConsensusStrategy::ConnectedComponents);
        assert!((config.forecast.smoothing_alpha - 0.3).abs() < 1e-12);
        assert_eq!(config.forecast.lstm_window, 10);
        assert_eq!(config.cache.forecast_ttl_secs, 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        env::set_var("SPINETEST_CLUSTER_MAX_ITERATIONS", "7");
        env::set_var("CLUSTER_MAX_AUTO_K", "4");
        let config = Config::for_profile("spinetest");
        assert_eq!(config.profile, "SPINETEST");
        assert_eq!(config.clustering.max_iterations, 7);
        assert_eq!(config.clustering.max_auto_k, 4);
        env::remove_var("SPINETEST_CLUSTER_MAX_ITERATIONS");
        env::remove_var("CLUSTER_MAX_AUTO_K");
    }

    #[test]
    fn consensus_strategy_parses() {
        assert_eq!("greedy".parse::<ConsensusStrategy>().unwrap(), ConsensusStrategy::Greedy);
        assert_eq!(
            "connected".parse::<ConsensusStrategy>().unwrap(),
            ConsensusStrategy::ConnectedComponents
        );
        assert!("kmeans".parse::<ConsensusStrategy>().is_err());
    }

    #[test]
    fn validate_rejects_bad_alpha() {
        let mut config = Config::default();
        config.forecast.smoothing_alpha = 0.0;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn validate_rejects_unrepresentable_ttl() {
        let mut config = Config::default();
        config.cache.forecast_ttl_secs = MAX_CACHE_TTL_SECS;
        assert!(config.validate().is_ok());
        config.cache.forecast_ttl_secs = u64::MAX / 2;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"forecast": {"adaptive": true}}"#).unwrap();
        assert!(config.forecast.adaptive);
        assert_eq!(config.clustering.max_iterations, 100);
    }
}
