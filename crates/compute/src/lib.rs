pub mod algorithms;
pub mod cache;
pub mod engine;
pub mod forecast;
pub mod segments;
pub mod types;

pub use algorithms::distance::euclidean_distance;
pub use algorithms::quality::QualityReport;
pub use algorithms::stats::ErrorMetrics;
pub use engine::{ClusterRequest, ClusteringEngine, ForecastRequest, ForecastingEngine};
pub use segments::{DomainFeatureSet, FeatureRole, FeatureSpec, SegmentRegistry, UserSegment, ValueTier};
pub use types::{
    ClusterResult, ClusteringMethod, ForecastMethod, ForecastResult, MethodWeight, TrendLabel,
};

pub use spine_core::{AnalyticsError, Config, FeatureMatrix, Result, TimeSeries};
