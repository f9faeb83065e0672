//! Engine objects that own configuration, a seedable random source and a
//! result cache, and run the estimator ensembles on request.
//!
//! Both engines are `Send + Sync`; the cache and other mutable state sit
//! behind mutexes so one instance can serve concurrent callers.

pub mod clustering;
pub mod forecasting;

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spine_core::{AnalyticsError, Result};

pub use clustering::{ClusterRequest, ClusteringEngine};
pub use forecasting::{ForecastRequest, ForecastingEngine, DEFAULT_MEMBERS};

/// Engine-owned random source. Each run draws a child generator so that
/// parallel estimators stay reproducible under a fixed seed.
struct SeededRng(Mutex<StdRng>);

impl SeededRng {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self(Mutex::new(rng))
    }

    fn child(&self) -> Result<StdRng> {
        let mut rng = self
            .0
            .lock()
            .map_err(|e| AnalyticsError::LockPoisoned(format!("rng: {}", e)))?;
        Ok(StdRng::seed_from_u64(rng.gen()))
    }
}
