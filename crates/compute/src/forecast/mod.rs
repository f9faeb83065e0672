//! Forecasting estimators and the machinery that combines them.
//!
//! - [`models`]: the individual estimators, each `(series, horizon) -> predictions`.
//! - [`ensemble`]: weighted combination, confidence, intervals, trend label.
//! - [`adaptive`]: back-test driven weights tracked across calls.

pub mod adaptive;
pub mod ensemble;
pub mod models;

pub use adaptive::PerformanceTracker;
pub use models::ModelParams;
