//! Shared venue fallback loop for the two perp-short executors: discover a
//! market on each adapter in order, size against the hedge ratio and
//! liquidity cap, open a short at market, and fall through to the next
//! venue on any failure.

use std::sync::Arc;

use hedge_core::{AttemptFailureReason, Clock, HedgePosition, Policy, PositionState, Size, StrategyKind, Usd};
use hedge_venues::adapter::{OrderKind, OrderSide, PlaceOrderRequest, VenueAdapter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use crate::config::TRADABLE_FRACTION;
use crate::outcome::{map_venue_failure, ExecutionOutcome};

#[allow(clippy::too_many_arguments)]
pub(crate) async fn open_short_with_fallback(
    venues: &[Arc<dyn VenueAdapter>],
    policy: &Policy,
    selector: &str,
    default_leverage: Decimal,
    hedge_ratio: Decimal,
    clock: &dyn Clock,
    fingerprint: String,
) -> ExecutionOutcome {
    let mut last_failure = AttemptFailureReason::AllVenuesExhausted;
    let mut last_venue = None;

    for adapter in venues {
        let snapshot = match adapter.discover_market(selector).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                last_failure = map_venue_failure(&err);
                last_venue = Some(adapter.venue());
                continue;
            }
        };

        let target = policy.coverage_amount.fraction(hedge_ratio);
        let capped = snapshot.cap_to_liquidity(target, TRADABLE_FRACTION);
        if capped.is_zero() {
            last_failure = AttemptFailureReason::InsufficientLiquidity;
            last_venue = Some(adapter.venue());
            continue;
        }

        let venue_cap = snapshot.max_leverage / dec!(2);
        let leverage = default_leverage.min(venue_cap);

        let quantity = Size::new(capped.inner() / snapshot.price.inner());
        let collateral = Usd::new(capped.inner() / leverage);

        let request = PlaceOrderRequest {
            instrument_id: snapshot.instrument_id.clone(),
            side: OrderSide::Sell,
            size: quantity,
            leverage,
            kind: OrderKind::Market,
            limit_price: None,
        };

        let fill = match adapter.place_order(request).await {
            Ok(fill) => fill,
            Err(err) => {
                last_failure = map_venue_failure(&err);
                last_venue = Some(adapter.venue());
                continue;
            }
        };

        let mut position = HedgePosition::new_opening(
            policy.id,
            StrategyKind::ShortPerp,
            adapter.venue(),
            snapshot.instrument_id,
            capped,
            fill.filled_size,
            fill.average_price,
            collateral,
            leverage,
            clock.now(),
        );
        position.external_id = Some(fill.external_order_id);
        position
            .transition_to(PositionState::Open)
            .expect("Opening always permits Open");

        info!(
            policy_id = %policy.id,
            venue = %adapter.venue(),
            notional = %capped,
            leverage = %leverage,
            "opened perp short hedge"
        );
        return ExecutionOutcome::Opened { position, fingerprint };
    }

    ExecutionOutcome::Declined {
        reason: last_failure,
        venue: last_venue,
        fingerprint,
    }
}
