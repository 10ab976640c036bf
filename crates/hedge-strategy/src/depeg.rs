//! Depeg executor: hedges a Depeg policy with a Polymarket YES share on a
//! binary market that pays out on the same depeg event.

use std::sync::Arc;

use hedge_core::{Clock, CoverageKind, HedgePosition, Policy, PositionState, Size, StrategyKind, Usd, Venue};
use hedge_venues::adapter::{OrderKind, OrderSide, PlaceOrderRequest, VenueAdapter};
use tracing::info;

use crate::config::{HedgeRatios, TRADABLE_FRACTION};
use crate::outcome::{fingerprint, map_venue_failure, ExecutionOutcome};

pub struct DepegExecutor {
    polymarket: Arc<dyn VenueAdapter>,
    ratios: HedgeRatios,
    clock: Arc<dyn Clock>,
}

impl DepegExecutor {
    pub fn new(polymarket: Arc<dyn VenueAdapter>, ratios: HedgeRatios, clock: Arc<dyn Clock>) -> Self {
        Self {
            polymarket,
            ratios,
            clock,
        }
    }

    pub fn applies_to(&self, policy: &Policy) -> bool {
        policy.coverage_kind == CoverageKind::Depeg
    }

    /// Discover a qualifying market, size against the hedge ratio and
    /// liquidity cap, place a limit order at the observed ask.
    pub async fn execute(&self, policy: &Policy) -> ExecutionOutcome {
        let fp = attempt_fingerprint(policy);

        let snapshot = match self.polymarket.discover_market(&policy.protected_asset).await {
            Ok(snapshot) => snapshot,
            Err(_) => {
                info!(policy_id = %policy.id, "no qualifying depeg market found");
                return ExecutionOutcome::Declined {
                    reason: hedge_core::AttemptFailureReason::NoHedgeApplicable,
                    venue: None,
                    fingerprint: fp,
                };
            }
        };

        if snapshot.price.is_zero() {
            return ExecutionOutcome::Declined {
                reason: hedge_core::AttemptFailureReason::NoHedgeApplicable,
                venue: Some(Venue::Polymarket),
                fingerprint: fp,
            };
        }

        let target = policy.coverage_amount.fraction(self.ratios.ratio_for(CoverageKind::Depeg));
        let capped = snapshot.cap_to_liquidity(target, TRADABLE_FRACTION);
        if capped.is_zero() {
            return ExecutionOutcome::Declined {
                reason: hedge_core::AttemptFailureReason::InsufficientLiquidity,
                venue: Some(Venue::Polymarket),
                fingerprint: fp,
            };
        }

        let share_count = Size::new(capped.inner() / snapshot.price.inner());

        let request = PlaceOrderRequest {
            instrument_id: snapshot.instrument_id.clone(),
            side: OrderSide::Buy,
            size: share_count,
            leverage: rust_decimal::Decimal::ONE,
            kind: OrderKind::Limit,
            limit_price: Some(snapshot.price),
        };

        let fill = match self.polymarket.place_order(request).await {
            Ok(fill) => fill,
            Err(err) => {
                info!(policy_id = %policy.id, error = %err, "depeg order placement failed");
                return ExecutionOutcome::Declined {
                    reason: map_venue_failure(&err),
                    venue: Some(Venue::Polymarket),
                    fingerprint: fp,
                };
            }
        };

        let notional = Usd::new(fill.filled_size.inner() * fill.average_price.inner());

        let mut position = HedgePosition::new_opening(
            policy.id,
            StrategyKind::PredictionMarketYes,
            Venue::Polymarket,
            snapshot.instrument_id,
            notional,
            fill.filled_size,
            fill.average_price,
            notional,
            rust_decimal::Decimal::ONE,
            self.clock.now(),
        );
        position.external_id = Some(fill.external_order_id);
        position
            .transition_to(PositionState::Open)
            .expect("Opening always permits Open");

        info!(policy_id = %policy.id, notional = %notional, "opened depeg hedge");
        ExecutionOutcome::Opened {
            position,
            fingerprint: fp,
        }
    }
}

fn attempt_fingerprint(policy: &Policy) -> String {
    fingerprint(&[&policy.id.to_string(), "Depeg", "Polymarket"])
}
