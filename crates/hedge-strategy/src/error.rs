//! Error types for hedge-strategy.
//!
//! Per the error-handling design, a strategy finding no applicable hedge is
//! never an error — it is `ExecutionOutcome::Declined`. This enum exists
//! only for executor construction/configuration failures.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum StrategyError {
    #[error("invalid hedge ratio for {kind}: {reason}")]
    InvalidHedgeRatio { kind: String, reason: String },

    #[error("no venue adapters configured for this executor")]
    NoAdaptersConfigured,
}

pub type Result<T> = std::result::Result<T, StrategyError>;
