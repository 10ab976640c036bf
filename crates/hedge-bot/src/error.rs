//! The binary's top-level error enum. Used only at the `main`/wiring
//! boundary; every library crate keeps its own scoped error type and
//! propagates via `?` up to one of these `#[from]` arms. `anyhow::Context`
//! is reserved for one-shot startup failures (config load, client
//! construction) that have no recovery path other than process exit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Http(#[from] hedge_http::HttpCoreError),

    #[error(transparent)]
    Venue(#[from] hedge_venues::VenueError),

    #[error(transparent)]
    Strategy(#[from] hedge_strategy::StrategyError),

    #[error(transparent)]
    Position(#[from] hedge_position::PositionError),

    #[error(transparent)]
    Orchestrator(#[from] hedge_orchestrator::OrchestratorError),

    #[error(transparent)]
    Repository(#[from] hedge_repository::RepositoryError),

    #[error(transparent)]
    Telemetry(#[from] hedge_telemetry::TelemetryError),

    #[error(transparent)]
    Core(#[from] hedge_core::CoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BotResult<T> = Result<T, BotError>;
