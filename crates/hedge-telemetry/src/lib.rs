//! Prometheus metrics, structured logging, and the domain event bus for the
//! hedge orchestrator.
//!
//! Provides observability from Day 1:
//! - Prometheus metrics for HTTP, circuit breakers, executions, positions
//! - Structured JSON logging with tracing
//! - The `HedgeEvent` broadcast stream the orchestrator and lifecycle loops
//!   publish to without referencing one another directly

pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use events::{HedgeEvent, DEFAULT_CHANNEL_CAPACITY};
pub use logging::init_logging;
