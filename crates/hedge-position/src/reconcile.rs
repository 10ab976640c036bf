//! Reconciliation against policy status and venue-reported truth. Split
//! from `tracker` because these checks drive state transitions rather than
//! economic updates.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use hedge_core::{Clock, HedgePosition, PositionState, Usd, Venue};
use hedge_repository::Repository;
use hedge_telemetry::events::HedgeEvent;
use hedge_venues::{adapter::VenueAdapter, VenueError};

use crate::error::Result;

/// Close any Open position whose linked policy now demands a close
/// (Expired/Claimed). Positions still `Opening` are left alone: a
/// close enqueued against an order that has not yet confirmed would race the
/// open itself, so this defers until a later cycle observes `Open` or
/// `Failed` (the Claimed-while-Opening ordering decision).
pub async fn reconcile_policy_closes(
    repo: &dyn Repository,
    adapters: &HashMap<Venue, Arc<dyn VenueAdapter>>,
    clock: &dyn Clock,
    events: &broadcast::Sender<HedgeEvent>,
    position: &HedgePosition,
    policy_demands_close: bool,
) -> Result<()> {
    if !policy_demands_close || position.state != PositionState::Open {
        return Ok(());
    }

    let Some(external_id) = position.external_id.as_deref() else {
        return Ok(());
    };

    let Some(adapter) = adapters.get(&position.venue) else {
        warn!(position_id = %position.id, venue = %position.venue, "no adapter configured for venue, cannot close");
        return Ok(());
    };

    let now = clock.now();
    repo.update_position_state(position.id, PositionState::Closing, None, now).await?;

    let close = adapter.close_position(external_id).await?;

    repo.update_position_state(position.id, PositionState::Closed, Some(close.realized_pnl_usd), now)
        .await?;

    info!(position_id = %position.id, realized_pnl = %close.realized_pnl_usd, "hedge closed on policy resolution");
    let _ = events.send(HedgeEvent::HedgeClosed {
        position_id: position.id,
        policy_id: position.policy_id,
        realized_pnl_usd: close.realized_pnl_usd,
        at: now,
    });

    Ok(())
}

/// Detect drift between our record and venue truth for a position we
/// believe is still in flight: the venue reporting the position gone
/// (`PositionNotFound`) closes it out using the last-known unrealized P&L as
/// the realized figure, since a confirmed Open position implies a real fill
/// that can only have disappeared via a close or liquidation we missed.
pub async fn reconcile_against_venue(
    repo: &dyn Repository,
    adapters: &HashMap<Venue, Arc<dyn VenueAdapter>>,
    clock: &dyn Clock,
    events: &broadcast::Sender<HedgeEvent>,
    position: &HedgePosition,
) -> Result<()> {
    if !matches!(position.state, PositionState::Open | PositionState::Closing) {
        return Ok(());
    }

    let Some(external_id) = position.external_id.as_deref() else {
        return Ok(());
    };

    let Some(adapter) = adapters.get(&position.venue) else {
        return Ok(());
    };

    match adapter.query_position(external_id).await {
        Ok(_) => Ok(()),
        Err(VenueError::PositionNotFound) => {
            let now = clock.now();
            warn!(position_id = %position.id, "venue no longer reports this position, reconciling closed");

            if position.state == PositionState::Open {
                repo.update_position_state(position.id, PositionState::Closing, None, now).await?;
            }
            repo.update_position_state(
                position.id,
                PositionState::Closed,
                Some(position.unrealized_pnl_usd),
                now,
            )
            .await?;

            let _ = events.send(HedgeEvent::ReconciliationDrift {
                position_id: position.id,
                detail: "venue reports position closed; reconciled using last-known unrealized P&L".to_string(),
                at: now,
            });
            let _ = events.send(HedgeEvent::HedgeClosed {
                position_id: position.id,
                policy_id: position.policy_id,
                realized_pnl_usd: position.unrealized_pnl_usd,
                at: now,
            });
            Ok(())
        }
        Err(err) => {
            warn!(position_id = %position.id, error = %err, "reconciliation query failed, retrying next cycle");
            Ok(())
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
    use rust_decimal_macros::dec;

    fn stub_adapter(
        venue: Venue,
        query_result: std::result::Result<PositionQuery, VenueError>,
        close_result_pnl: Usd,
    ) -> MockVenueAdapter {
        let mut mock = MockVenueAdapter::new();
        mock.expect_venue().returning(move || venue);
        mock.expect_close_position().returning(move |_| {
            Ok(CloseResult {
                realized_pnl_usd: close_result_pnl,
                fee_usd: Usd::ZERO,
            })
        });
        mock.expect_query_position()
            .returning(move |_| query_result.clone());
        mock
    }

    fn open_position() -> HedgePosition {
        let mut position = HedgePosition::new_opening(
            hedge_core::PolicyId(7),
            StrategyKind::ShortPerp,
            Venue::Hyperliquid,
            "AAVE-PERP".to_string(),
            Usd::new(dec!(30000)),
            Size::new(dec!(181.3)),
            Price::new(dec!(165.50)),
            Usd::new(dec!(3000)),
            dec!(10),
            Utc::now(),
        );
        position.external_id = Some("hl-pos-7".to_string());
        position.state = PositionState::Open;
        position
    }

    #[tokio::test]
    async fn claimed_policy_closes_open_position() {
        let repo = InMemoryRepository::new();
        let position = open_position();
        repo.insert_position(position.clone());

        let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(
            Venue::Hyperliquid,
            Arc::new(stub_adapter(
                Venue::Hyperliquid,
                Ok(PositionQuery {
                    size: position.quantity,
                    entry_price: position.entry_price,
                    mark_price: position.entry_price,
                    funding_accrued_usd: Usd::ZERO,
                    liquidation_price: None,
                }),
                Usd::new(dec!(-500)),
            )),
        );

        let clock = FakeClock::new(Utc::now());
        let (tx, mut rx) = broadcast::channel(16);

        reconcile_policy_closes(&repo, &adapters, &clock, &tx, &position, true).await.unwrap();

        let stored = repo.position(position.id).unwrap();
        assert_eq!(stored.state, PositionState::Closed);
        assert_eq!(stored.realized_pnl_usd, Some(Usd::new(dec!(-500))));
        assert!(matches!(rx.try_recv().unwrap(), HedgeEvent::HedgeClosed { .. }));
    }

    #[tokio::test]
    async fn opening_position_is_not_closed_even_if_policy_demands_it() {
        let repo = InMemoryRepository::new();
        let mut position = open_position();
        position.state = PositionState::Opening;
        position.external_id = None;
        repo.insert_position(position.clone());

        let adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        let clock = FakeClock::new(Utc::now());
        let (tx, _rx) = broadcast::channel(16);

        reconcile_policy_closes(&repo, &adapters, &clock, &tx, &position, true).await.unwrap();

        let stored = repo.position(position.id).unwrap();
        assert_eq!(stored.state, PositionState::Opening);
    }

    #[tokio::test]
    async fn venue_reporting_position_gone_reconciles_as_closed() {
        let repo = InMemoryRepository::new();
        let mut position = open_position();
        position.unrealized_pnl_usd = Usd::new(dec!(-1200));
        repo.insert_position(position.clone());

        let mut adapters: HashMap<Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(
            Venue::Hyperliquid,
            Arc::new(stub_adapter(Venue::Hyperliquid, Err(VenueError::PositionNotFound), Usd::ZERO)),
        );

        let clock = FakeClock::new(Utc::now());
        let (tx, mut rx) = broadcast::channel(16);

        reconcile_against_venue(&repo, &adapters, &clock, &tx, &position).await.unwrap();

        let stored = repo.position(position.id).unwrap();
        assert_eq!(stored.state, PositionState::Closed);
        assert_eq!(stored.realized_pnl_usd, Some(Usd::new(dec!(-1200))));

        let first = rx.try_recv().unwrap();
        assert!(matches!(first, HedgeEvent::ReconciliationDrift { .. }));
        let second = rx.try_recv().unwrap();
        assert!(matches!(second, HedgeEvent::HedgeClosed { .. }));
    }
}
