//! Error types for hedge-venues.

use hedge_http::HttpCoreError;
use thiserror::Error;

/// Venue-layer error taxonomy. `MarketNotFound` and
/// `InsufficientLiquidity` are recovered by venue failover inside a strategy
/// executor; the rest surface as a hedge failure.
#[derive(Debug, Error, Clone)]
pub enum VenueError {
    #[error("market not found")]
    MarketNotFound,

    #[error("insufficient liquidity")]
    InsufficientLiquidity,

    #[error("insufficient margin")]
    InsufficientMargin,

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("position not found")]
    PositionNotFound,

    #[error("authentication error: {0}")]
    AuthenticationError(String),

    #[error("operation unsupported on this venue: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Http(#[from] HttpCoreError),
}

pub type Result<T> = std::result::Result<T, VenueError>;
