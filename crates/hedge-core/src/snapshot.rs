//! VenueMarketSnapshot: ephemeral market-state read from a venue adapter.
//! Never persisted — a fresh snapshot is taken for every sizing decision.

use crate::{Price, Usd};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A point-in-time read of a venue's market for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueMarketSnapshot {
    pub instrument_id: String,
    /// Mark price for perps, YES-share price (in `[0, 1]`) for prediction markets.
    pub price: Price,
    /// Hourly-normalized funding rate; zero for prediction markets.
    pub funding_rate_hourly: Decimal,
    pub open_interest: Usd,
    pub max_leverage: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl VenueMarketSnapshot {
    /// Effective liquidity available for sizing: 25% of open interest by
    /// default, distinct from the 5%-of-liquidity per-trade cap
    /// applied by strategy executors.
    pub fn effective_liquidity(&self, tradable_fraction: Decimal) -> Usd {
        self.open_interest.fraction(tradable_fraction)
    }

    /// Cap a target notional at 5% of this snapshot's effective liquidity.
    pub fn cap_to_liquidity(&self, target: Usd, tradable_fraction: Decimal) -> Usd {
        use rust_decimal_macros::dec;
        let liquidity = self.effective_liquidity(tradable_fraction);
        let cap = liquidity.fraction(dec!(0.05));
        target.min(cap)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.observed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample(open_interest: Decimal) -> VenueMarketSnapshot {
        VenueMarketSnapshot {
            instrument_id: "AAVE-PERP".to_string(),
            price: Price::new(dec!(165.50)),
            funding_rate_hourly: dec!(0.00001),
            open_interest: Usd::new(open_interest),
            max_leverage: dec!(50),
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn effective_liquidity_is_quarter_of_open_interest_by_default() {
        let snap = sample(dec!(8_000_000));
        assert_eq!(snap.effective_liquidity(dec!(0.25)), Usd::new(dec!(2_000_000)));
    }

    #[test]
    fn cap_to_liquidity_clamps_oversized_target() {
        let snap = sample(dec!(8_000_000)); // liquidity = 2,000,000; 5% cap = 100,000
        let capped = snap.cap_to_liquidity(Usd::new(dec!(500_000)), dec!(0.25));
        assert_eq!(capped, Usd::new(dec!(100_000)));
    }

    #[test]
    fn cap_to_liquidity_passes_through_small_target() {
        let snap = sample(dec!(8_000_000));
        let capped = snap.cap_to_liquidity(Usd::new(dec!(30_000)), dec!(0.25));
        assert_eq!(capped, Usd::new(dec!(30_000)));
    }
}
