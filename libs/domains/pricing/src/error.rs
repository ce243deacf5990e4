use std::time::Duration;
use thiserror::Error;

/// Result type for pricing operations
pub type PricingResult<T> = Result<T, PricingError>;

/// Errors surfaced to callers of the estimation engine.
///
/// Fetch and cache failures never appear here: they are absorbed by the
/// resolver's fallback chain.
#[derive(Debug, Error)]
pub enum PricingError {
    /// Invalid input data (discount out of range, malformed override table)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<validator::ValidationErrors> for PricingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        PricingError::InvalidInput(errors.to_string())
    }
}

/// Result type for live pricing fetches
pub type FetchResult<T> = Result<T, FetchError>;

/// Failure of a single live pricing source
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pricing API returned status {0}")]
    Status(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response contained no usable prices")]
    Empty,
}

impl FetchError {
    /// Short classifier used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Http(_) => "http",
            FetchError::Status(_) => "status",
            FetchError::Parse(_) => "parse",
            FetchError::Timeout(_) => "timeout",
            FetchError::Empty => "empty",
        }
    }
}

/// Read or write failure on the pricing cache store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache I/O error for '{service}': {source}")]
    Io {
        service: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt cache entry for '{service}': {details}")]
    Corrupt { service: String, details: String },
}
