//! Domain event stream: the orchestrator and lifecycle loops communicate
//! only through the repository and this event stream, never through direct
//! references to one another. Shaped like a WS fanout
//! broadcaster: a single `broadcast::Sender` constructed once and cloned to
//! every publisher and subscriber.

use chrono::{DateTime, Utc};
use hedge_core::{CoverageKind, PolicyId, PositionId, StrategyKind, Venue};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

/// Channel capacity for the broadcast event bus. Generous relative to
/// expected event rates (a handful of positions per iteration); a lagging
/// subscriber drops the oldest events rather than blocking publishers.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// A notable domain occurrence, published for dashboards/alerting to
/// consume. Never required for correctness: every event here is also durably
/// recorded via a `Repository` write (position state, attempt) before (or
/// alongside) publication.
#[derive(Debug, Clone, PartialEq)]
pub enum HedgeEvent {
    HedgeOpened {
        position_id: PositionId,
        policy_id: PolicyId,
        strategy: StrategyKind,
        venue: Venue,
        at: DateTime<Utc>,
    },
    HedgeClosed {
        position_id: PositionId,
        policy_id: PolicyId,
        realized_pnl_usd: hedge_core::Usd,
        at: DateTime<Utc>,
    },
    HedgeLiquidated {
        position_id: PositionId,
        policy_id: PolicyId,
        at: DateTime<Utc>,
    },
    HedgeFailed {
        policy_id: PolicyId,
        coverage_kind: CoverageKind,
        reason: String,
        at: DateTime<Utc>,
    },
    LiquidationRiskWarning {
        position_id: PositionId,
        policy_id: PolicyId,
        loss_fraction: Decimal,
        at: DateTime<Utc>,
    },
    LiquidationRiskCritical {
        position_id: PositionId,
        policy_id: PolicyId,
        loss_fraction: Decimal,
        at: DateTime<Utc>,
    },
    VenueCircuitOpen {
        venue: Venue,
        endpoint: String,
        at: DateTime<Utc>,
    },
    VenueCircuitClosed {
        venue: Venue,
        endpoint: String,
        at: DateTime<Utc>,
    },
    ReconciliationDrift {
        position_id: PositionId,
        detail: String,
        at: DateTime<Utc>,
    },
}

/// Construct the single broadcast channel shared by both long-lived loops
/// and whatever consumes it (a dashboard, a log sink, tests).
pub fn channel() -> (broadcast::Sender<HedgeEvent>, broadcast::Receiver<HedgeEvent>) {
    broadcast::channel(DEFAULT_CHANNEL_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn publishing_past_capacity_drops_oldest_rather_than_blocking() {
        let (tx, mut rx) = broadcast::channel::<HedgeEvent>(2);
        for i in 0..5u64 {
            let _ = tx.send(HedgeEvent::LiquidationRiskWarning {
                position_id: PositionId::new(),
                policy_id: PolicyId(i),
                loss_fraction: dec!(0.6),
                at: Utc::now(),
            });
        }
        // The receiver lags; it still gets a usable error rather than panicking.
        assert!(rx.try_recv().is_err() || rx.try_recv().is_ok());
    }
}
