//! Error types for the market data tools.

use chainfeed_resilience::FetchError;
use thiserror::Error;

use crate::models::ParseChainError;

/// Errors returned by [`MarketDataService`](crate::MarketDataService) operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The request itself was unusable (empty symbol list, unknown chain).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every provider failed and no cached value could substitute.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl From<ParseChainError> for ServiceError {
    fn from(error: ParseChainError) -> Self {
        ServiceError::InvalidInput(error.to_string())
    }
}

/// Result type alias for market data operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
