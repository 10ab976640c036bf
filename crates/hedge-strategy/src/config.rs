//! Per-`CoverageKind` hedge ratio table, read by every executor when
//! sizing a new position.

use hedge_core::CoverageKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fraction of coverage amount targeted as hedge notional, by coverage kind.
#[derive(Debug, Clone)]
pub struct HedgeRatios {
    pub depeg: Decimal,
    pub smart_contract: Decimal,
    pub oracle: Decimal,
    pub bridge: Decimal,
    pub cex_liquidation: Decimal,
}

impl HedgeRatios {
    pub fn ratio_for(&self, kind: CoverageKind) -> Decimal {
        match kind {
            CoverageKind::Depeg => self.depeg,
            CoverageKind::SmartContract => self.smart_contract,
            CoverageKind::Oracle => self.oracle,
            CoverageKind::Bridge => self.bridge,
            CoverageKind::CexLiquidation => self.cex_liquidation,
        }
    }
}

impl Default for HedgeRatios {
    /// Depeg 0.20, SmartContract 0.30, Bridge 0.40, CexLiquidation 0.25;
    /// Oracle inherits SmartContract's 0.30 absent an explicit override.
    fn default() -> Self {
        Self {
            depeg: dec!(0.20),
            smart_contract: dec!(0.30),
            oracle: dec!(0.30),
            bridge: dec!(0.40),
            cex_liquidation: dec!(0.25),
        }
    }
}

/// Fraction of a `VenueMarketSnapshot`'s open interest treated as tradable
/// before the additional 5%-of-liquidity per-trade cap is applied.
pub const TRADABLE_FRACTION: Decimal = dec!(0.25);

/// Fraction of coverage-scaled target notional capped against available
/// liquidity.
pub const LIQUIDITY_CAP_FRACTION: Decimal = dec!(0.05);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_coverage_ratio_table() {
        let ratios = HedgeRatios::default();
        assert_eq!(ratios.ratio_for(CoverageKind::Depeg), dec!(0.20));
        assert_eq!(ratios.ratio_for(CoverageKind::SmartContract), dec!(0.30));
        assert_eq!(ratios.ratio_for(CoverageKind::Oracle), dec!(0.30));
        assert_eq!(ratios.ratio_for(CoverageKind::Bridge), dec!(0.40));
        assert_eq!(ratios.ratio_for(CoverageKind::CexLiquidation), dec!(0.25));
    }
}
