//! The orchestrator loop itself: the other of the two independent
//! long-lived tasks a running bot spawns. Talks to the lifecycle loop only
//! through the shared `Repository` and the `HedgeEvent` broadcast stream.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{info, warn};

use hedge_core::{AttemptFailureReason, Clock, CoverageKind, ExecutionAttempt, Policy, PolicyId, StrategyKind, Usd};
use hedge_repository::Repository;
use hedge_strategy::{CexCorrelationExecutor, DepegExecutor, ExecutionOutcome, ProtocolShortExecutor};
use hedge_telemetry::events::HedgeEvent;
use hedge_telemetry::metrics;

use crate::budget::{BudgetLimits, IterationBudget};
use crate::control::ControlSource;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub budget: BudgetLimits,
    pub loop_period: Duration,
    pub iteration_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            budget: BudgetLimits::default(),
            loop_period: Duration::from_secs(30),
            iteration_deadline: Duration::from_secs(20),
        }
    }
}

/// The primary strategy kind a coverage kind's dominant hedge leg produces,
/// used only to label a budget-skip audit record for a policy the
/// orchestrator never got around to dispatching this iteration.
fn primary_strategy(coverage_kind: CoverageKind) -> StrategyKind {
    match coverage_kind {
        CoverageKind::Depeg => StrategyKind::PredictionMarketYes,
        CoverageKind::SmartContract | CoverageKind::Oracle | CoverageKind::Bridge | CoverageKind::CexLiquidation => {
            StrategyKind::ShortPerp
        }
    }
}

pub struct Orchestrator<C: ControlSource> {
    repo: Arc<dyn Repository>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<HedgeEvent>,
    control: C,
    config: OrchestratorConfig,
    depeg: DepegExecutor,
    protocol_short: ProtocolShortExecutor,
    cex_correlation: CexCorrelationExecutor,
}

impl<C: ControlSource> Orchestrator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn Repository>,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<HedgeEvent>,
        control: C,
        config: OrchestratorConfig,
        depeg: DepegExecutor,
        protocol_short: ProtocolShortExecutor,
        cex_correlation: CexCorrelationExecutor,
    ) -> Self {
        Self {
            repo,
            clock,
            events,
            control,
            config,
            depeg,
            protocol_short,
            cex_correlation,
        }
    }

    /// Which executors apply to a policy, paired with the strategy kind
    /// each would produce — used both for dispatch and for the
    /// at-most-one-in-flight-hedge-per-(policy,strategy) duplication check.
    fn applicable_strategies(&self, policy: &Policy) -> Vec<StrategyKind> {
        let mut strategies = Vec::new();
        if policy.coverage_kind == CoverageKind::Depeg {
            strategies.push(StrategyKind::PredictionMarketYes);
            strategies.push(StrategyKind::ShortPerp);
        } else if hedge_strategy::protocol_short::applies_to(policy.coverage_kind)
            || hedge_strategy::cex_correlation::applies_to(policy.coverage_kind)
        {
            strategies.push(StrategyKind::ShortPerp);
        }
        strategies
    }

    async fn dispatch(&self, policy: &Policy, strategy: StrategyKind) -> Option<ExecutionOutcome> {
        match (policy.coverage_kind, strategy) {
            (CoverageKind::Depeg, StrategyKind::PredictionMarketYes) => Some(self.depeg.execute(policy).await),
            (CoverageKind::Depeg, StrategyKind::ShortPerp) => Some(self.protocol_short.execute(policy).await),
            (CoverageKind::SmartContract | CoverageKind::Oracle | CoverageKind::Bridge, StrategyKind::ShortPerp) => {
                Some(self.protocol_short.execute(policy).await)
            }
            (CoverageKind::CexLiquidation, StrategyKind::ShortPerp) => Some(self.cex_correlation.execute(policy).await),
            _ => None,
        }
    }

    /// One full iteration: load due policies, dispatch each to its
    /// executor, enforce the per-iteration budget, persist outcomes.
    pub async fn run_once(&self) -> Result<()> {
        let timer = std::time::Instant::now();
        let deadline = Instant::now() + self.config.iteration_deadline;

        if self.control.pause_new_openings() {
            info!("orchestrator iteration skipped: pause_new_openings is set");
            metrics::ORCHESTRATOR_ITERATION_SECONDS
                .with_label_values(&["paused"])
                .observe(timer.elapsed().as_secs_f64());
            return Ok(());
        }

        let now = self.clock.now();
        let policies = self.repo.load_active_policies().await?;
        let hedgeable: Vec<Policy> = policies.into_iter().filter(|p| p.is_hedgeable(now)).collect();

        let policy_ids: Vec<PolicyId> = hedgeable.iter().map(|p| p.id).collect();
        let open_positions = self.repo.load_open_positions(&policy_ids).await?;
        let in_flight: HashSet<(PolicyId, StrategyKind)> =
            open_positions.iter().map(|p| (p.policy_id, p.strategy)).collect();

        let mut budget = IterationBudget::new(self.config.budget);
        let mut abandoned = 0usize;

        for policy in &hedgeable {
            if Instant::now() >= deadline {
                warn!(policy_id = %policy.id, "orchestrator iteration deadline exceeded, abandoning remaining work");
                abandoned += hedgeable.len();
                break;
            }

            if !budget.has_capacity() {
                self.record_budget_skip(policy, now).await;
                abandoned += 1;
                continue;
            }

            let strategies: Vec<StrategyKind> = self
                .applicable_strategies(policy)
                .into_iter()
                .filter(|s| !in_flight.contains(&(policy.id, *s)))
                .collect();

            if strategies.is_empty() {
                continue;
            }

            let outcomes = join_all(strategies.iter().map(|s| self.dispatch(policy, *s))).await;
            let mut policy_notional = Usd::ZERO;
            let mut policy_hedged = false;

            for outcome in outcomes.into_iter().flatten() {
                self.record_outcome(policy, outcome, now, &mut policy_notional, &mut policy_hedged).await;
            }

            if policy_hedged {
                budget.record_hedge(policy_notional);
            }
        }

        let outcome_label = if abandoned > 0 { "partial" } else { "ok" };
        metrics::ORCHESTRATOR_ITERATION_SECONDS
            .with_label_values(&[outcome_label])
            .observe(timer.elapsed().as_secs_f64());
        info!(
            hedged = budget.policies_hedged(),
            notional = %budget.notional_opened(),
            abandoned,
            "orchestrator iteration complete"
        );

        Ok(())
    }

    async fn record_budget_skip(&self, policy: &Policy, now: chrono::DateTime<chrono::Utc>) {
        let attempt = ExecutionAttempt::failure(
            policy.id,
            primary_strategy(policy.coverage_kind),
            None,
            String::new(),
            AttemptFailureReason::BudgetExceeded,
            now,
        );
        if let Err(err) = self.repo.persist_attempt(&attempt).await {
            warn!(policy_id = %policy.id, error = %err, "failed to persist budget-skip attempt");
        }
    }

    async fn record_outcome(
        &self,
        policy: &Policy,
        outcome: ExecutionOutcome,
        now: chrono::DateTime<chrono::Utc>,
        policy_notional: &mut Usd,
        policy_hedged: &mut bool,
    ) {
        match outcome {
            ExecutionOutcome::Opened { position, fingerprint } => {
                if let Err(err) = self.repo.persist_position(&position).await {
                    warn!(policy_id = %policy.id, error = %err, "failed to persist opened position");
                    return;
                }
                let attempt = ExecutionAttempt::success(
                    policy.id,
                    position.strategy,
                    position.venue,
                    fingerprint,
                    position.id,
                    now,
                );
                let _ = self.repo.persist_attempt(&attempt).await;

                *policy_notional = *policy_notional + position.notional_usd;
                *policy_hedged = true;

                info!(policy_id = %policy.id, position_id = %position.id, "hedge opened");
                let _ = self.events.send(HedgeEvent::HedgeOpened {
                    position_id: position.id,
                    policy_id: policy.id,
                    strategy: position.strategy,
                    venue: position.venue,
                    at: now,
                });
            }
            ExecutionOutcome::Declined { reason, venue, fingerprint } => {
                let strategy = primary_strategy(policy.coverage_kind);
                let attempt = ExecutionAttempt::failure(policy.id, strategy, venue, fingerprint, reason.clone(), now);
                let _ = self.repo.persist_attempt(&attempt).await;

                if !matches!(reason, AttemptFailureReason::NoHedgeApplicable) {
                    let _ = self.events.send(HedgeEvent::HedgeFailed {
                        policy_id: policy.id,
                        coverage_kind: policy.coverage_kind,
                        reason: reason.to_string(),
                        at: now,
                    });
                }
            }
        }
    }

    /// Drive `run_once` on a fixed interval until the process shuts down.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = interval(self.config.loop_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.run_once().await {
                warn!(error = %err, "orchestrator iteration aborted");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::AtomicControl;
    use chrono::{Duration as ChronoDuration, Utc};
    use hedge_core::position::Venue;
    use hedge_core::{FakeClock, Price, PolicyStatus, Size, VenueMarketSnapshot};
    use hedge_repository::InMemoryRepository;
    use hedge_strategy::HedgeRatios;
    use hedge_venues::adapter::{CloseResult, MockVenueAdapter, OrderFill, PositionQuery, VenueAdapter};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// A mock that always discovers the same market and fills every order
    /// at the snapshot price, for driving the full depeg/protocol-short/
    /// cex-correlation path without a network.
    fn fake_adapter(venue: Venue, snapshot: VenueMarketSnapshot) -> MockVenueAdapter {
        let fill_price = snapshot.price;
        let funding_rate = snapshot.funding_rate_hourly;
        let mut mock = MockVenueAdapter::new();
        mock.expect_venue().returning(move || venue);
        mock.expect_discover_market()
            .returning(move |_| Ok(snapshot.clone()));
        mock.expect_place_order().returning(move |request| {
            Ok(OrderFill {
                external_order_id: "fake-order".to_string(),
                filled_size: request.size,
                average_price: fill_price,
            })
        });
        mock.expect_close_position().returning(|_| {
            Ok(CloseResult {
                realized_pnl_usd: Usd::ZERO,
                fee_usd: Usd::ZERO,
            })
        });
        mock.expect_query_position().returning(move |_| {
            Ok(PositionQuery {
                size: Size::new(dec!(1)),
                entry_price: fill_price,
                mark_price: fill_price,
                funding_accrued_usd: Usd::ZERO,
                liquidation_price: None,
            })
        });
        mock.expect_query_funding_rate().returning(move |_| Ok(funding_rate));
        mock
    }

    fn depeg_snapshot() -> VenueMarketSnapshot {
        VenueMarketSnapshot {
            instrument_id: "USDC-DEPEG-YES".to_string(),
            price: Price::new(dec!(0.95)),
            funding_rate_hourly: Decimal::ZERO,
            open_interest: Usd::new(dec!(8_000_000)),
            max_leverage: dec!(1),
            observed_at: Utc::now(),
        }
    }

    fn sample_policy(id: u64, coverage_kind: CoverageKind) -> Policy {
        let now = Utc::now();
        Policy {
            id: PolicyId(id),
            owner_address: "0xabc".to_string(),
            coverage_kind,
            protected_asset: "USDC".to_string(),
            protected_chain: "Ethereum".to_string(),
            coverage_amount: Usd::new(dec!(100_000)),
            start_at: now - ChronoDuration::days(30),
            end_at: now + ChronoDuration::days(30),
            status: PolicyStatus::Active,
        }
    }

    fn build_orchestrator(
        repo: Arc<dyn Repository>,
        budget: BudgetLimits,
        control: AtomicControl,
    ) -> Orchestrator<AtomicControl> {
        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc::now()));
        let (events, _rx) = broadcast::channel(16);
        let polymarket: Arc<dyn VenueAdapter> = Arc::new(fake_adapter(Venue::Polymarket, depeg_snapshot()));
        let ratios = HedgeRatios::default();
        Orchestrator::new(
            repo,
            clock.clone(),
            events,
            control,
            OrchestratorConfig {
                budget,
                loop_period: Duration::from_secs(30),
                iteration_deadline: Duration::from_secs(20),
            },
            DepegExecutor::new(polymarket, ratios.clone(), clock.clone()),
            ProtocolShortExecutor::new(Vec::new(), ratios.clone(), clock.clone()),
            CexCorrelationExecutor::new(
                Arc::new(fake_adapter(Venue::BinanceFutures, depeg_snapshot())),
                ratios,
                clock,
            ),
        )
    }

    #[tokio::test]
    async fn run_once_opens_a_hedge_for_an_eligible_depeg_policy() {
        let memory = InMemoryRepository::new();
        memory.insert_policy(sample_policy(1, CoverageKind::Depeg));
        let repo: Arc<dyn Repository> = Arc::new(memory);
        let orchestrator = build_orchestrator(repo.clone(), BudgetLimits::default(), AtomicControl::new(false));

        orchestrator.run_once().await.unwrap();

        let positions = repo.load_open_positions(&[PolicyId(1)]).await.unwrap();
        assert_eq!(positions.len(), 1);
    }

    #[tokio::test]
    async fn pause_new_openings_skips_the_iteration_entirely() {
        let memory = InMemoryRepository::new();
        memory.insert_policy(sample_policy(2, CoverageKind::Depeg));
        let repo: Arc<dyn Repository> = Arc::new(memory);
        let orchestrator = build_orchestrator(repo.clone(), BudgetLimits::default(), AtomicControl::new(true));

        orchestrator.run_once().await.unwrap();

        let positions = repo.load_open_positions(&[PolicyId(2)]).await.unwrap();
        assert!(positions.is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_skips_remaining_policies_and_records_an_attempt() {
        let memory = InMemoryRepository::new();
        memory.insert_policy(sample_policy(3, CoverageKind::Depeg));
        memory.insert_policy(sample_policy(4, CoverageKind::Depeg));
        let repo: Arc<dyn Repository> = Arc::new(memory);
        let budget = BudgetLimits {
            max_policies_per_iteration: 1,
            max_aggregate_notional_usd: Usd::new(dec!(10_000_000)),
        };
        let orchestrator = build_orchestrator(repo.clone(), budget, AtomicControl::new(false));

        orchestrator.run_once().await.unwrap();

        let opened = repo.load_open_positions(&[PolicyId(3), PolicyId(4)]).await.unwrap();
        assert_eq!(opened.len(), 1, "only the first policy should fit the per-iteration budget");
    }
}
