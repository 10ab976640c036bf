//! Error types for hedge-orchestrator.

use thiserror::Error;

/// Orchestrator-layer error taxonomy. `BudgetExceeded` is recorded as
/// an `ExecutionAttempt` failure reason, not raised here — a budget cap is
/// an expected steady-state condition, never an abort. This enum exists for
/// failures that abort the current iteration outright.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Repository(#[from] hedge_repository::RepositoryError),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
