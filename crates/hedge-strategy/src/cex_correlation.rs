//! CEX Correlation executor: hedges a CexLiquidation policy with a Binance
//! Futures short on the correlated major the protected position is exposed
//! to. Sizing and leverage follow the same rules as the Protocol
//! Short executor, with a fixed default leverage of 3x.

use std::sync::Arc;

use hedge_core::{Clock, CoverageKind, Policy};
use hedge_venues::adapter::VenueAdapter;
use rust_decimal_macros::dec;

use crate::config::HedgeRatios;
use crate::outcome::{fingerprint, ExecutionOutcome};
use crate::venue_fallback::open_short_with_fallback;

pub fn applies_to(kind: CoverageKind) -> bool {
    matches!(kind, CoverageKind::CexLiquidation)
}

/// Majors this executor recognizes as correlated exposure; anything else in
/// `protected_asset` falls back to BTC, the broadest correlation proxy.
const KNOWN_MAJORS: &[&str] = &["BTC", "ETH", "SOL", "BNB"];

fn correlated_major(protected_asset: &str) -> &'static str {
    KNOWN_MAJORS
        .iter()
        .find(|major| protected_asset.eq_ignore_ascii_case(major))
        .copied()
        .unwrap_or("BTC")
}

pub struct CexCorrelationExecutor {
    binance: Arc<dyn VenueAdapter>,
    ratios: HedgeRatios,
    clock: Arc<dyn Clock>,
}

impl CexCorrelationExecutor {
    pub fn new(binance: Arc<dyn VenueAdapter>, ratios: HedgeRatios, clock: Arc<dyn Clock>) -> Self {
        Self { binance, ratios, clock }
    }

    pub async fn execute(&self, policy: &Policy) -> ExecutionOutcome {
        let fp = fingerprint(&[&policy.id.to_string(), "CexCorrelation"]);
        let selector = correlated_major(&policy.protected_asset);
        let ratio = self.ratios.ratio_for(CoverageKind::CexLiquidation);

        open_short_with_fallback(
            std::slice::from_ref(&self.binance),
            policy,
            selector,
            dec!(3),
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
    use hedge_core::{FakeClock, Policy, PolicyId, PolicyStatus, Price, Usd, VenueMarketSnapshot};
    use hedge_venues::adapter::{MockVenueAdapter, OrderFill};
    use rust_decimal_macros::dec;

    #[test]
    fn applies_to_covers_cex_liquidation_only() {
        assert!(applies_to(CoverageKind::CexLiquidation));
        assert!(!applies_to(CoverageKind::Depeg));
    }

    #[test]
    fn correlated_major_recognizes_known_assets_case_insensitively() {
        assert_eq!(correlated_major("eth"), "ETH");
        assert_eq!(correlated_major("SOL"), "SOL");
    }

    #[test]
    fn correlated_major_falls_back_to_btc_for_unknown_assets() {
        assert_eq!(correlated_major("SHIB"), "BTC");
    }

    #[tokio::test]
    async fn shorts_correlated_major_on_binance_futures() {
        let policy = Policy {
            id: PolicyId(91),
            owner_address: "0xabc".to_string(),
            coverage_kind: CoverageKind::CexLiquidation,
            protected_asset: "BTC".to_string(),
            protected_chain: "N/A".to_string(),
            coverage_amount: Usd::new(dec!(100_000)),
            start_at: chrono::Utc::now() - chrono::Duration::days(5),
            end_at: chrono::Utc::now() + chrono::Duration::days(60),
            status: PolicyStatus::Active,
        };

        let snapshot = VenueMarketSnapshot {
            instrument_id: "BTC-PERP".to_string(),
            price: Price::new(dec!(60000)),
            funding_rate_hourly: rust_decimal::Decimal::ZERO,
            open_interest: Usd::new(dec!(40_000_000)),
            max_leverage: dec!(20),
            observed_at: chrono::Utc::now(),
        };

        let mut binance = MockVenueAdapter::new();
        binance.expect_venue().returning(|| hedge_core::Venue::BinanceFutures);
        binance.expect_discover_market().returning(move |_| Ok(snapshot.clone()));
        binance.expect_place_order().returning(|request| {
            Ok(OrderFill {
                external_order_id: "bin-order-1".to_string(),
                filled_size: request.size,
                average_price: Price::new(dec!(60000)),
            })
        });

        let executor = CexCorrelationExecutor::new(
            Arc::new(binance),
            HedgeRatios::default(),
            Arc::new(FakeClock::new(chrono::Utc::now())),
        );

        let outcome = executor.execute(&policy).await;
        match outcome {
            ExecutionOutcome::Opened { position, .. } => {
                assert_eq!(position.instrument, "BTC-PERP");
                assert_eq!(position.notional_usd, Usd::new(dec!(25000)));
                assert_eq!(position.leverage, dec!(3));
                assert_eq!(position.venue, hedge_core::Venue::BinanceFutures);
                assert_eq!(position.state, hedge_core::PositionState::Open);
            }
            other => panic!("expected an opened hedge, got {other:?}"),
        }
    }
}
