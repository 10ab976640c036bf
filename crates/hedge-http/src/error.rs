//! Error types for hedge-http.

use thiserror::Error;

/// Network-layer error taxonomy. All are recovered locally via
/// retry/failover inside `Client::request` except `CircuitOpen` and
/// `AllEndpointsFailed`, which surface to the caller.
#[derive(Debug, Error, Clone)]
pub enum HttpCoreError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("http error {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("circuit open for endpoint")]
    CircuitOpen,

    #[error("connection pool exhausted")]
    PoolExhausted,

    #[error("rate limited")]
    RateLimited,

    #[error("response parse error: {0}")]
    ParseError(String),

    #[error("all endpoints failed")]
    AllEndpointsFailed,
}

impl HttpCoreError {
    /// Whether this failure is retryable: retryable network errors and the
    /// configured retryable status codes, never a `ParseError`.
    pub fn is_retryable(&self, retryable_status_codes: &[u16]) -> bool {
        match self {
            Self::Timeout | Self::ConnectionError(_) => true,
            Self::HttpError { status, .. } => retryable_status_codes.contains(status),
            Self::ParseError(_)
            | Self::CircuitOpen
            | Self::PoolExhausted
            | Self::RateLimited
            | Self::AllEndpointsFailed => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpCoreError>;
