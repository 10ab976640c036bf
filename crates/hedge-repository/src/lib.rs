//! The repository port: a narrow, typed persistence and audit
//! boundary. The core specifies this trait; a production implementation
//! (a real database) lives outside this crate, which carries the contract
//! and an in-memory test double.

pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;

pub use error::{RepositoryError, Result};
#[cfg(any(test, feature = "memory"))]
pub use memory::InMemoryRepository;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hedge_core::{ExecutionAttempt, HedgePosition, Policy, PolicyId, PositionId, PositionState, Usd};

/// Typed persistence and audit boundary every orchestrator/lifecycle task
/// depends on. Implementations must refuse backward state transitions at
/// the persistence boundary, mirroring the in-memory guard on
/// `HedgePosition::transition_to`.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// All currently-`Active` policies, ordered however the backend
    /// prefers; callers filter by `is_hedgeable` themselves.
    async fn load_active_policies(&self) -> Result<Vec<Policy>>;

    /// Positions linked to the given policies still in flight, used for the
    /// at-most-one-in-flight-hedge-per-(policy,strategy) duplication check
    /// the orchestrator runs before dispatching a new attempt.
    async fn load_open_positions(&self, policy_ids: &[PolicyId]) -> Result<Vec<HedgePosition>>;

    /// Every position still in flight (`Opening`, `Open`, or `Closing`)
    /// regardless of its policy's current status, used by the lifecycle
    /// loop's mark-to-market and reconciliation cycle. Unlike
    /// `load_open_positions`, this is not scoped to a policy allowlist: a
    /// position whose policy has since expired or been claimed still needs
    /// reconciling, not silently dropped.
    async fn load_in_flight_positions(&self) -> Result<Vec<HedgePosition>>;

    /// Durable write, atomic with respect to the `ExecutionAttempt` that
    /// produced it.
    async fn persist_position(&self, position: &HedgePosition) -> Result<()>;

    /// Append-only audit log; never mutated once written.
    async fn persist_attempt(&self, attempt: &ExecutionAttempt) -> Result<()>;

    /// Apply a state transition, refusing any that run backward.
    /// `realized_pnl` is set only on a transition to `Closed`.
    async fn update_position_state(
        &self,
        id: PositionId,
        new_state: PositionState,
        realized_pnl: Option<Usd>,
        now: DateTime<Utc>,
    ) -> Result<()>;
}
