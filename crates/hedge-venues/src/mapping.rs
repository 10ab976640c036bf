//! Deterministic coverage -> protocol-token mapping. One flat struct per
//! market entry, matched by a linear scan over a fixed table rather than a
//! hash map, since the table is small and read-mostly.

use hedge_core::policy::CoverageKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Token category; determines default leverage before the venue's
/// `max_leverage / 2` cap is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCategory {
    Lending,
    Dex,
    Oracle,
    Stablecoin,
    Bridge,
}

impl TokenCategory {
    pub fn default_leverage(&self) -> Decimal {
        match self {
            Self::Lending => dec!(10),
            Self::Dex => dec!(6),
            Self::Oracle => dec!(8),
            Self::Stablecoin => dec!(5),
            Self::Bridge => dec!(4),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProtocolTokenEntry {
    pub coverage_kind: CoverageKind,
    pub chain: &'static str,
    pub asset: &'static str,
    pub protocol_name: &'static str,
    pub token_symbol: &'static str,
    pub category: TokenCategory,
}

/// The explicit (coverage kind, chain, asset) -> (protocol, symbol,
/// category) table. Deliberately small and hand-curated: a policy whose
/// (kind, chain, asset) is not covered here yields `NoHedgeApplicable`
/// rather than a guessed mapping.
pub fn lookup(coverage_kind: CoverageKind, chain: &str, asset: &str) -> Option<ProtocolTokenEntry> {
    TABLE
        .iter()
        .find(|entry| {
            entry.coverage_kind == coverage_kind
                && entry.chain.eq_ignore_ascii_case(chain)
                && entry.asset.eq_ignore_ascii_case(asset)
        })
        .cloned()
}

const TABLE: &[ProtocolTokenEntry] = &[
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::SmartContract,
        chain: "Ethereum",
        asset: "USDC",
        protocol_name: "Aave",
        token_symbol: "AAVE",
        category: TokenCategory::Lending,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::SmartContract,
        chain: "Ethereum",
        asset: "USDT",
        protocol_name: "Compound",
        token_symbol: "COMP",
        category: TokenCategory::Lending,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::SmartContract,
        chain: "Arbitrum",
        asset: "ETH",
        protocol_name: "GMX",
        token_symbol: "GMX",
        category: TokenCategory::Dex,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::SmartContract,
        chain: "Ethereum",
        asset: "ETH",
        protocol_name: "Uniswap",
        token_symbol: "UNI",
        category: TokenCategory::Dex,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::Oracle,
        chain: "Ethereum",
        asset: "ETH",
        protocol_name: "Chainlink",
        token_symbol: "LINK",
        category: TokenCategory::Oracle,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::Depeg,
        chain: "Ethereum",
        asset: "DAI",
        protocol_name: "MakerDAO",
        token_symbol: "MKR",
        category: TokenCategory::Stablecoin,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::Depeg,
        chain: "Ethereum",
        asset: "FRAX",
        protocol_name: "Frax Finance",
        token_symbol: "FXS",
        category: TokenCategory::Stablecoin,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::Bridge,
        chain: "Arbitrum",
        asset: "ETH",
        protocol_name: "Arbitrum Bridge",
        token_symbol: "ARB",
        category: TokenCategory::Bridge,
    },
    ProtocolTokenEntry {
        coverage_kind: CoverageKind::Bridge,
        chain: "Polygon",
        asset: "MATIC",
        protocol_name: "Polygon PoS Bridge",
        token_symbol: "POL",
        category: TokenCategory::Bridge,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_aave_lending() {
        let entry = lookup(CoverageKind::SmartContract, "Ethereum", "USDC").unwrap();
        assert_eq!(entry.token_symbol, "AAVE");
        assert_eq!(entry.category.default_leverage(), dec!(10));
    }

    #[test]
    fn unmapped_small_chain_returns_none() {
        assert!(lookup(CoverageKind::SmartContract, "Polygon", "DAI").is_none());
    }

    #[test]
    fn category_default_leverage_matches_table() {
        assert_eq!(TokenCategory::Lending.default_leverage(), dec!(10));
        assert_eq!(TokenCategory::Dex.default_leverage(), dec!(6));
        assert_eq!(TokenCategory::Oracle.default_leverage(), dec!(8));
        assert_eq!(TokenCategory::Stablecoin.default_leverage(), dec!(5));
        assert_eq!(TokenCategory::Bridge.default_leverage(), dec!(4));
    }
}
