//! Protocol Short executor: shorts a protocol's governance/utility token on
//! a perp venue, following the deterministic (coverage kind, chain, asset)
//! -> token mapping. Venue fallback order is fixed by the order
//! adapters are configured in: Hyperliquid, then GMX, then Binance Futures;
//! the first adapter to discover a market and accept the order wins.

use std::sync::Arc;

use hedge_core::{AttemptFailureReason, Clock, CoverageKind, Policy};
use hedge_venues::adapter::VenueAdapter;
use tracing::info;

use crate::config::HedgeRatios;
use crate::outcome::{fingerprint, ExecutionOutcome};
use crate::venue_fallback::open_short_with_fallback;

/// Coverage kinds this executor handles directly. Algorithmic stablecoin
/// Depeg policies are dispatched here too by the orchestrator,
/// alongside the dedicated Depeg executor, since a governance-token short
/// is a second, independent hedge leg for that coverage kind.
pub fn applies_to(kind: CoverageKind) -> bool {
    matches!(
        kind,
        CoverageKind::SmartContract | CoverageKind::Oracle | CoverageKind::Bridge
    )
}

pub struct ProtocolShortExecutor {
    /// Ordered venue fallback chain: Hyperliquid, GMX, Binance Futures.
    venues: Vec<Arc<dyn VenueAdapter>>,
    ratios: HedgeRatios,
    clock: Arc<dyn Clock>,
}

impl ProtocolShortExecutor {
    pub fn new(venues: Vec<Arc<dyn VenueAdapter>>, ratios: HedgeRatios, clock: Arc<dyn Clock>) -> Self {
        Self { venues, ratios, clock }
    }

    pub async fn execute(&self, policy: &Policy) -> ExecutionOutcome {
        let fp = fingerprint(&[&policy.id.to_string(), "ProtocolShort"]);

        let Some(entry) = hedge_venues::mapping::lookup(
            policy.coverage_kind,
            &policy.protected_chain,
            &policy.protected_asset,
        ) else {
            info!(policy_id = %policy.id, "no protocol token mapping entry");
            return ExecutionOutcome::Declined {
                reason: AttemptFailureReason::NoHedgeApplicable,
                venue: None,
                fingerprint: fp,
            };
        };

        let ratio = self.ratios.ratio_for(policy.coverage_kind);
        open_short_with_fallback(
            &self.venues,
            policy,
            entry.token_symbol,
            entry.category.default_leverage(),
            ratio,
            &*self.clock,
            fp,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hedge_core::{FakeClock, Policy, PolicyId, PolicyStatus, Price, Size, Usd, VenueMarketSnapshot};
    use hedge_venues::adapter::{MockVenueAdapter, OrderFill};
    use rust_decimal_macros::dec;

    #[test]
    fn applies_to_covers_smart_contract_oracle_bridge_only() {
        assert!(applies_to(CoverageKind::SmartContract));
        assert!(applies_to(CoverageKind::Oracle));
        assert!(applies_to(CoverageKind::Bridge));
        assert!(!applies_to(CoverageKind::Depeg));
        assert!(!applies_to(CoverageKind::CexLiquidation));
    }

    /// An Aave-on-Ethereum SmartContract policy shorts AAVE at 10x on
    /// Hyperliquid, capped by half of the venue's 50x max leverage.
    #[tokio::test]
    async fn shorts_aave_on_hyperliquid() {
        let policy = Policy {
            id: PolicyId(43),
            owner_address: "0xabc".to_string(),
            coverage_kind: CoverageKind::SmartContract,
            protected_asset: "USDC".to_string(),
            protected_chain: "Ethereum".to_string(),
            coverage_amount: Usd::new(dec!(100_000)),
            start_at: chrono::Utc::now() - chrono::Duration::days(10),
            end_at: chrono::Utc::now() + chrono::Duration::days(300),
            status: PolicyStatus::Active,
        };

        let snapshot = VenueMarketSnapshot {
            instrument_id: "AAVE-PERP".to_string(),
            price: Price::new(dec!(165.50)),
            funding_rate_hourly: rust_decimal::Decimal::ZERO,
            open_interest: Usd::new(dec!(8_000_000)),
            max_leverage: dec!(50),
            observed_at: chrono::Utc::now(),
        };

        let mut hyperliquid = MockVenueAdapter::new();
        hyperliquid.expect_venue().returning(|| hedge_core::Venue::Hyperliquid);
        hyperliquid.expect_discover_market().returning(move |_| Ok(snapshot.clone()));
        hyperliquid.expect_place_order().returning(|request| {
            Ok(OrderFill {
                external_order_id: "hl-order-1".to_string(),
                filled_size: request.size,
                average_price: Price::new(dec!(165.50)),
            })
        });

        let executor = ProtocolShortExecutor::new(
            vec![Arc::new(hyperliquid)],
            HedgeRatios::default(),
            Arc::new(FakeClock::new(chrono::Utc::now())),
        );

        let outcome = executor.execute(&policy).await;
        match outcome {
            ExecutionOutcome::Opened { position, .. } => {
                assert_eq!(position.notional_usd, Usd::new(dec!(30000)));
                assert_eq!(position.leverage, dec!(10));
                assert_eq!(position.collateral_usd, Usd::new(dec!(3000)));
                assert_eq!(position.quantity, Size::new(dec!(30000) / dec!(165.50)));
                assert_eq!(position.venue, hedge_core::Venue::Hyperliquid);
            }
            other => panic!("expected an opened hedge, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_mapping_entry_declines_with_no_hedge_applicable() {
        let policy = Policy {
            id: PolicyId(44),
            owner_address: "0xabc".to_string(),
            coverage_kind: CoverageKind::SmartContract,
            protected_asset: "DAI".to_string(),
            protected_chain: "Polygon".to_string(),
            coverage_amount: Usd::new(dec!(50_000)),
            start_at: chrono::Utc::now() - chrono::Duration::days(10),
            end_at: chrono::Utc::now() + chrono::Duration::days(300),
            status: PolicyStatus::Active,
        };

        let executor = ProtocolShortExecutor::new(
            Vec::new(),
            HedgeRatios::default(),
            Arc::new(FakeClock::new(chrono::Utc::now())),
        );

        let outcome = executor.execute(&policy).await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::Declined {
                reason: hedge_core::AttemptFailureReason::NoHedgeApplicable,
                ..
            }
        ));
    }
}
