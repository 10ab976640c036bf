//! Mark-to-market and liquidation-risk classification.
//!
//! Shaped around the same periodic-poll/accrual loop used for position
//! tracking elsewhere in this codebase, rewritten against the venue-adapter
//! contract instead of a WS-driven order book: each cycle queries the venue
//! directly for the current mark rather than watching a streamed book.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use hedge_core::{Clock, HedgePosition, LiquidationRisk, PositionId, StrategyKind, Usd, Venue};
use hedge_repository::Repository;
use hedge_telemetry::events::HedgeEvent;
use hedge_venues::adapter::VenueAdapter;

use crate::error::Result;

/// Per-position direction multiplier in the unrealized-P&L formula:
/// `collateral x leverage x direction x (entry - mark) / entry`.
/// `None` for strategies with no leverage (prediction-market shares use the
/// simpler `shares x (ask - entry)` formula below instead).
fn perp_direction(strategy: StrategyKind) -> Option<Decimal> {
    match strategy {
        StrategyKind::ShortPerp => Some(Decimal::ONE),
        StrategyKind::LongPerp => Some(-Decimal::ONE),
        StrategyKind::PredictionMarketYes => None,
    }
}

/// Mark a single Open position against its venue and persist the refreshed
/// economic state. Stale responses (an observation no newer than the
/// position's last recorded mark) are discarded to preserve monotonicity.
pub async fn mark_position(
    repo: &dyn Repository,
    adapters: &HashMap<Venue, Arc<dyn VenueAdapter>>,
    clock: &dyn Clock,
    events: &broadcast::Sender<HedgeEvent>,
    last_risk: &DashMap<PositionId, LiquidationRisk>,
    position: &HedgePosition,
) -> Result<()> {
    let now = clock.now();
    if let Some(last_mark_at) = position.last_mark_at {
        if now <= last_mark_at {
            return Ok(());
        }
    }

    let Some(external_id) = position.external_id.as_deref() else {
        // Open positions always carry a venue-assigned external id once
        // confirmed; defensive guard against a malformed record.
        warn!(position_id = %position.id, "open position missing external_id, skipping mark");
        return Ok(());
    };

    let Some(adapter) = adapters.get(&position.venue) else {
        warn!(position_id = %position.id, venue = %position.venue, "no adapter configured for venue");
        return Ok(());
    };

    let query = match adapter.query_position(external_id).await {
        Ok(query) => query,
        Err(err) => {
            // Reconciliation (not marking) is responsible for interpreting
            // a missing position; transient query errors are logged and
            // retried next cycle.
            warn!(position_id = %position.id, error = %err, "mark-to-market query failed");
            return Ok(());
        }
    };

    let mut updated = position.clone();
    updated.last_mark_at = Some(now);

    let funding_delta = if perp_direction(position.strategy).is_some() {
        match adapter.query_funding_rate(&position.instrument).await {
            Ok(hourly_rate) => {
                let last_reference = position.last_mark_at.unwrap_or(position.opened_at);
                let hours_since_last_mark = Decimal::from((now - last_reference).num_seconds()) / Decimal::from(3600);
                Usd::new(position.notional_usd.inner() * hourly_rate * hours_since_last_mark)
            }
            Err(err) => {
                warn!(position_id = %position.id, error = %err, "funding rate query failed, skipping accrual this cycle");
                Usd::ZERO
            }
        }
    } else {
        Usd::ZERO
    };
    updated.funding_accrued_usd = Usd::new(position.funding_accrued_usd.inner() + funding_delta.inner());

    updated.unrealized_pnl_usd = match perp_direction(position.strategy) {
        Some(direction) => {
            let entry = position.entry_price.inner();
            let mark = query.mark_price.inner();
            if entry.is_zero() {
                Usd::ZERO
            } else {
                Usd::new(position.collateral_usd.inner() * position.leverage * direction * (entry - mark) / entry)
            }
        }
        None => Usd::new(position.quantity.inner() * (query.mark_price.inner() - position.entry_price.inner())),
    };

    repo.persist_position(&updated).await?;

    // Liquidation-risk classification only applies to short perps;
    // prediction-market shares and (unused today) long perps carry no
    // liquidation threshold in this model.
    if position.strategy == StrategyKind::ShortPerp {
        let entry = position.entry_price.inner();
        if !entry.is_zero() {
            let loss_fraction = position.leverage * (query.mark_price.inner() - entry) / entry;
            let risk = LiquidationRisk::classify(loss_fraction);
            let previous = last_risk.insert(position.id, risk);
            if previous != Some(risk) {
                let event = match risk {
                    LiquidationRisk::Warning => Some(HedgeEvent::LiquidationRiskWarning {
                        position_id: position.id,
                        policy_id: position.policy_id,
                        loss_fraction,
                        at: now,
                    }),
                    LiquidationRisk::Critical => Some(HedgeEvent::LiquidationRiskCritical {
                        position_id: position.id,
                        policy_id: position.policy_id,
                        loss_fraction,
                        at: now,
                    }),
                    LiquidationRisk::Safe => None,
                };
                if let Some(event) = event {
                    info!(position_id = %position.id, ?risk, %loss_fraction, "liquidation risk transition");
                    let _ = events.send(event);
                }
            }
        }

        // A venue-reported liquidation price crossed by the current mark is
        // an authoritative forced close, distinct from the advisory
        // Warning/Critical classification above:
        // `Open --(venue reports liquidation)--> Liquidated`.
        if let Some(liq_price) = query.liquidation_price {
            if query.mark_price.inner() >= liq_price.inner() {
                repo.update_position_state(
                    position.id,
                    hedge_core::PositionState::Liquidated,
                    Some(Usd::new(-position.collateral_usd.inner())),
                    now,
                )
                .await?;
                warn!(position_id = %position.id, "position liquidated");
                let _ = events.send(HedgeEvent::HedgeLiquidated {
                    position_id: position.id,
                    policy_id: position.policy_id,
                    at: now,
                });
            }
        }
    }

    Ok(())
}
