//! Error types for hedge-position.

use thiserror::Error;

/// Position-layer error taxonomy. Venue and repository errors that are
/// recoverable within a single lifecycle cycle are handled inline
/// and logged rather than propagated; this enum exists for failures that
/// should abort the current cycle's work on one position without aborting
/// the whole lifecycle loop.
#[derive(Debug, Error)]
pub enum PositionError {
    #[error("position not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Repository(#[from] hedge_repository::RepositoryError),

    #[error(transparent)]
    Venue(#[from] hedge_venues::VenueError),
}

pub type Result<T> = std::result::Result<T, PositionError>;
