use thiserror::Error;

/// Result alias used across the analytics crates.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Malformed or insufficient input. Never corrected silently.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An estimator failed on otherwise valid input.
    #[error("{0}")]
    Computation(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AnalyticsError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    /// Wrap a failure from inside an ensemble run with the ensemble's context.
    ///
    /// Input errors pass through untouched so callers can still tell them apart.
    pub fn in_ensemble(self, context: &str) -> Self {
        match self {
            Self::InvalidInput(_) => self,
            other => Self::Computation(format!("{}: {}", context, other)),
        }
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
