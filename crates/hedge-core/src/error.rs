//! Error types for hedge-core.

use thiserror::Error;

/// Core error types: domain-type construction failures.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("invalid coverage amount: {0}")]
    InvalidCoverageAmount(String),

    #[error("invalid policy identifier: {0}")]
    InvalidPolicyId(String),

    #[error("decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
