pub mod config;
pub mod error;
pub mod matrix;
pub mod series;

pub use config::{CacheConfig, ClusteringConfig, Config, ConsensusStrategy, ForecastConfig};
pub use error::*;
pub use matrix::FeatureMatrix;
pub use series::TimeSeries;
