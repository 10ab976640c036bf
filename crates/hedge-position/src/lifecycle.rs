//! The lifecycle loop itself: one of the two independent long-lived
//! tasks a running bot spawns, the other being the orchestrator loop. The
//! two communicate only through the shared `Repository` and the
//! `HedgeEvent` broadcast stream, never through a direct reference to one
//! another. Shaped around the same periodic-poll loop used
//! elsewhere in this codebase for order-book risk gates, rewritten here
//! around venue reconciliation instead.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use hedge_core::{Clock, HedgePosition, LiquidationRisk, PositionId, Venue};
use hedge_repository::Repository;
use hedge_telemetry::events::HedgeEvent;
use hedge_telemetry::metrics;
use hedge_venues::adapter::VenueAdapter;

use crate::{reconcile, tracker};

/// Lifecycle loop timing, validated at construction against the 30-120s
/// band the ambient config layer enforces.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub loop_period: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            loop_period: Duration::from_secs(60),
        }
    }
}

/// Owns the position side of the running bot: mark-to-market, liquidation
/// risk classification, and reconciliation against policy status and venue
/// truth, run once per tick against every currently in-flight position.
pub struct LifecycleManager {
    repo: Arc<dyn Repository>,
    adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<HedgeEvent>,
    config: LifecycleConfig,
    last_risk: DashMap<PositionId, LiquidationRisk>,
}

impl LifecycleManager {
    pub fn new(
        repo: Arc<dyn Repository>,
        adapters: HashMap<Venue, Arc<dyn VenueAdapter>>,
        clock: Arc<dyn Clock>,
        events: broadcast::Sender<HedgeEvent>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            adapters,
            clock,
            events,
            config,
            last_risk: DashMap::new(),
        }
    }

    /// One full cycle over every in-flight position: mark-to-market first
    /// (so reconciliation sees the freshest unrealized P&L for a possible
    /// closed-out fallback figure), then policy-driven closes, then
    /// venue-truth reconciliation. Concurrency is bounded by the rate
    /// limiter already enforced inside each `hedge-http::Client`, so this
    /// just fans the per-position work out with `join_all` rather than
    /// adding a second semaphore on top.
    pub async fn run_once(&self, policy_demands_close: impl Fn(hedge_core::PolicyId) -> bool) -> usize {
        let timer = std::time::Instant::now();
        let positions = match self.repo.load_in_flight_positions().await {
            Ok(positions) => positions,
            Err(err) => {
                error!(error = %err, "lifecycle loop failed to load open positions");
                metrics::LIFECYCLE_ITERATION_SECONDS
                    .with_label_values(&["error"])
                    .observe(timer.elapsed().as_secs_f64());
                return 0;
            }
        };
        self.run_cycle_over(&positions, policy_demands_close).await;

        metrics::LIFECYCLE_ITERATION_SECONDS
            .with_label_values(&["ok"])
            .observe(timer.elapsed().as_secs_f64());
        positions.len()
    }

    async fn run_cycle_over(&self, positions: &[HedgePosition], policy_demands_close: impl Fn(hedge_core::PolicyId) -> bool) {
        let mark_tasks = positions.iter().filter(|p| p.state == hedge_core::PositionState::Open).map(|position| {
            tracker::mark_position(
                self.repo.as_ref(),
                &self.adapters,
                self.clock.as_ref(),
                &self.events,
                &self.last_risk,
                position,
            )
        });
        for result in join_all(mark_tasks).await {
            if let Err(err) = result {
                error!(error = %err, "mark-to-market failed for a position");
            }
        }

        for position in positions {
            let demands_close = policy_demands_close(position.policy_id);
            if let Err(err) =
                reconcile::reconcile_policy_closes(self.repo.as_ref(), &self.adapters, self.clock.as_ref(), &self.events, position, demands_close)
                    .await
            {
                error!(error = %err, position_id = %position.id, "policy-driven close failed");
            }
        }

        let reconcile_tasks = positions.iter().map(|position| {
            reconcile::reconcile_against_venue(self.repo.as_ref(), &self.adapters, self.clock.as_ref(), &self.events, position)
        });
        for result in join_all(reconcile_tasks).await {
            if let Err(err) = result {
                error!(error = %err, "venue reconciliation failed for a position");
            }
        }

        debug!(count = positions.len(), "lifecycle cycle complete");
    }

    /// Drive `run_once` on a fixed interval until the process shuts down.
    /// `policy_demands_close` is supplied by the caller (typically backed by
    /// the same policy cache the orchestrator loop reads) rather than owned
    /// here, keeping this crate free of any dependency on how policies are
    /// sourced.
    pub async fn run(self: Arc<Self>, policy_demands_close: impl Fn(hedge_core::PolicyId) -> bool + Send + Sync + 'static) {
        let mut ticker = interval(self.config.loop_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let count = self.run_once(&policy_demands_close).await;
            info!(positions = count, "lifecycle iteration complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use hedge_core::{FakeClock, Price, Size, StrategyKind};
    use hedge_repository::InMemoryRepository;
    use hedge_venues::adapter::{CloseResult, MockVenueAdapter, PositionQuery};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn noop_adapter(venue: Venue) -> MockVenueAdapter {
        let mut mock = MockVenueAdapter::new();
        mock.expect_venue().returning(move || venue);
        mock.expect_close_position().returning(|_| {
            Ok(CloseResult {
                realized_pnl_usd: hedge_core::Usd::ZERO,
                fee_usd: hedge_core::Usd::ZERO,
            })
        });
        mock.expect_query_position().returning(|_| {
            Ok(PositionQuery {
                size: Size::new(dec!(1)),
                entry_price: Price::new(dec!(1)),
                mark_price: Price::new(dec!(1)),
                funding_accrued_usd: hedge_core::Usd::ZERO,
                liquidation_price: None,
            })
        });
        mock.expect_query_funding_rate().returning(|_| Ok(Decimal::ZERO));
        mock
    }

    #[tokio::test]
    async fn run_once_marks_and_reconciles_every_open_position() {
        let memory = InMemoryRepository::new();
        let mut position = HedgePosition::new_opening(
            hedge_core::PolicyId(1),
            StrategyKind::ShortPerp,
            Venue::Hyperliquid,
            "AAVE-PERP".to_string(),
            hedge_core::Usd::new(dec!(30000)),
            Size::new(dec!(181.3)),
            Price::new(dec!(165.50)),
            hedge_core::Usd::new(dec!(3000)),
            dec!(10),
            Utc::now(),
        );
        position.external_id = Some("hl-pos-1".to_string());
        position.state = hedge_core::PositionState::Open;
        memory.insert_position(position.clone());
        let repo: Arc<dyn Repository> = Arc::new(memory);

        let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(Venue::Hyperliquid, Arc::new(noop_adapter(Venue::Hyperliquid)));

        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(Utc::now()));
        let (tx, _rx) = broadcast::channel(16);
        let manager = LifecycleManager::new(repo, adapters, clock, tx, LifecycleConfig::default());

        let count = manager.run_once(|_| false).await;
        assert_eq!(count, 1);
    }
}
