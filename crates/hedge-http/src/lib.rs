//! Resilient HTTP core: one per-service client abstraction hiding transient
//! network failure (retry, failover, circuit breaking, rate limiting,
//! connection pooling) from venue adapters and the rest of the core.

pub mod backoff;
pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod pool;
pub mod rate_limiter;

pub use backoff::{delay_for_attempt, BackoffConfig};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{Client, ClientConfig, HttpResponse, Idempotent, Method, PoolConfig, RateLimitConfig, RetryConfig};
pub use error::{HttpCoreError, Result};
pub use pool::ConnectionPool;
pub use rate_limiter::RateLimiter;
