//! In-memory `Repository` test double, gated
//! behind `#[cfg(any(test, feature = "memory"))]`. A `DashMap`-backed
//! in-process registry, in the same style used for other in-process state
//! caches in this codebase, adapted here into a trait-conformant double
//! that drives the orchestrator/lifecycle integration tests without a real
//! database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use hedge_core::{ExecutionAttempt, HedgePosition, Policy, PolicyId, PositionId, PositionState, Usd};

use crate::error::{RepositoryError, Result};
use crate::Repository;

/// Backs the orchestrator/lifecycle integration tests. Not a production
/// persistence implementation — the real repository lives outside this
/// crate.
#[derive(Default)]
pub struct InMemoryRepository {
    policies: DashMap<PolicyId, Policy>,
    positions: DashMap<PositionId, HedgePosition>,
    attempts: Mutex<Vec<ExecutionAttempt>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a policy, as test setup would before running an orchestrator
    /// iteration against it.
    pub fn insert_policy(&self, policy: Policy) {
        self.policies.insert(policy.id, policy);
    }

    pub fn insert_position(&self, position: HedgePosition) {
        self.positions.insert(position.id, position);
    }

    pub fn attempts(&self) -> Vec<ExecutionAttempt> {
        self.attempts.lock().clone()
    }

    pub fn position(&self, id: PositionId) -> Option<HedgePosition> {
        self.positions.get(&id).map(|entry| entry.clone())
    }

    pub fn all_positions(&self) -> Vec<HedgePosition> {
        self.positions.iter().map(|entry| entry.value().clone()).collect()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn load_active_policies(&self) -> Result<Vec<Policy>> {
        Ok(self
            .policies
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|policy| policy.status.is_active())
            .collect())
    }

    async fn load_open_positions(&self, policy_ids: &[PolicyId]) -> Result<Vec<HedgePosition>> {
        Ok(self
            .positions
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|position| policy_ids.contains(&position.policy_id) && position.is_in_flight())
            .collect())
    }

    async fn load_in_flight_positions(&self) -> Result<Vec<HedgePosition>> {
        Ok(self
            .positions
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|position| position.is_in_flight())
            .collect())
    }

    async fn persist_position(&self, position: &HedgePosition) -> Result<()> {
        self.positions.insert(position.id, position.clone());
        Ok(())
    }

    async fn persist_attempt(&self, attempt: &ExecutionAttempt) -> Result<()> {
        self.attempts.lock().push(attempt.clone());
        Ok(())
    }

    async fn update_position_state(
        &self,
        id: PositionId,
        new_state: PositionState,
        realized_pnl: Option<Usd>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut entry = self
            .positions
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::PositionNotFound(id.to_string()))?;

        if !entry.state.can_transition_to(new_state) {
            return Err(RepositoryError::IllegalTransition {
                id: id.to_string(),
                from: entry.state.to_string(),
                to: new_state.to_string(),
            });
        }

        entry.state = new_state;
        entry.last_mark_at = Some(now);
        if new_state == PositionState::Closed {
            entry.realized_pnl_usd = realized_pnl;
            entry.closed_at = Some(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hedge_core::{CoverageKind, PolicyStatus, StrategyKind, Venue};
    use rust_decimal_macros::dec;

    fn sample_policy(status: PolicyStatus) -> Policy {
        let now = Utc::now();
        Policy {
            id: PolicyId(42),
            owner_address: "0xabc".to_string(),
            coverage_kind: CoverageKind::Depeg,
            protected_asset: "USDC".to_string(),
            protected_chain: "Ethereum".to_string(),
            coverage_amount: Usd::new(dec!(100_000)),
            start_at: now - Duration::days(30),
            end_at: now + Duration::days(30),
            status,
        }
    }

    fn sample_position() -> HedgePosition {
        HedgePosition::new_opening(
            PolicyId(42),
            StrategyKind::PredictionMarketYes,
            Venue::Polymarket,
            "usdc-depeg-2025".to_string(),
            Usd::new(dec!(20000)),
            hedge_core::Size::new(dec!(100000)),
            hedge_core::Price::new(dec!(0.20)),
            Usd::new(dec!(20000)),
            dec!(1),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn load_active_policies_filters_out_inactive() {
        let repo = InMemoryRepository::new();
        repo.insert_policy(sample_policy(PolicyStatus::Active));
        repo.insert_policy({
            let mut p = sample_policy(PolicyStatus::Expired);
            p.id = PolicyId(43);
            p
        });

        let active = repo.load_active_policies().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, PolicyId(42));
    }

    #[tokio::test]
    async fn load_open_positions_only_returns_in_flight() {
        let repo = InMemoryRepository::new();
        let mut closed = sample_position();
        closed.transition_to(PositionState::Open).unwrap();
        closed.transition_to(PositionState::Closing).unwrap();
        closed.transition_to(PositionState::Closed).unwrap();
        repo.insert_position(closed);
        repo.insert_position(sample_position());

        let open = repo.load_open_positions(&[PolicyId(42)]).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].state, PositionState::Opening);
    }

    #[tokio::test]
    async fn load_in_flight_positions_ignores_policy_scoping() {
        let repo = InMemoryRepository::new();
        let mut closed = sample_position();
        closed.transition_to(PositionState::Open).unwrap();
        closed.transition_to(PositionState::Closing).unwrap();
        closed.transition_to(PositionState::Closed).unwrap();
        repo.insert_position(closed);
        repo.insert_position(sample_position());

        let in_flight = repo.load_in_flight_positions().await.unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].state, PositionState::Opening);
    }

    #[tokio::test]
    async fn update_position_state_refuses_backward_transition() {
        let repo = InMemoryRepository::new();
        let position = sample_position();
        let id = position.id;
        repo.insert_position(position);

        repo.update_position_state(id, PositionState::Open, None, Utc::now())
            .await
            .unwrap();
        repo.update_position_state(id, PositionState::Closing, None, Utc::now())
            .await
            .unwrap();
        repo.update_position_state(id, PositionState::Closed, Some(Usd::new(dec!(-15000))), Utc::now())
            .await
            .unwrap();

        let err = repo
            .update_position_state(id, PositionState::Open, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::IllegalTransition { .. }));

        let stored = repo.position(id).unwrap();
        assert_eq!(stored.state, PositionState::Closed);
        assert_eq!(stored.realized_pnl_usd, Some(Usd::new(dec!(-15000))));
    }

    #[tokio::test]
    async fn update_position_state_on_unknown_id_errors() {
        let repo = InMemoryRepository::new();
        let err = repo
            .update_position_state(PositionId::new(), PositionState::Open, None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::PositionNotFound(_)));
    }
}
