//! Error types for hedge-repository.

use thiserror::Error;

/// Repository-layer error taxonomy. `RepositoryError` aborts the current
/// orchestrator/lifecycle iteration but preserves durability — it never
/// terminates the loop.
#[derive(Debug, Error, Clone)]
pub enum RepositoryError {
    #[error("position not found: {0}")]
    PositionNotFound(String),

    #[error("illegal backward state transition for position {id}: {from} -> {to}")]
    IllegalTransition { id: String, from: String, to: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
