use thiserror::Error;

/// Result type for estimation operations.
pub type GeometryResult<T> = Result<T, GeometryError>;

/// Errors surfaced by the estimators and the orchestrator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    /// Too few usable days, an empty fit mask, or an all-NaN aggregate.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Solver failure, non-finite values, or no convergence after restarts.
    #[error("estimation failed: {0}")]
    Estimation(String),

    /// Unknown option value or inconsistent priors.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The prepared data view is malformed.
    #[error("upstream data error: {0}")]
    Upstream(String),
}

impl GeometryError {
    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn estimation(msg: impl Into<String>) -> Self {
        Self::Estimation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }
}
