//! HedgePosition: the core's primary aggregate, and its lifecycle state machine.

use crate::policy::PolicyId;
use crate::{CoreError, Price, Result, Size, Usd};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Synthetic position identifier minted by the core. Never conflated with
/// `external_id`, which is venue-assigned and may not exist yet while
/// `Opening` (per the open-question decision in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(pub Uuid);

impl PositionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PositionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which strategy opened this position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PredictionMarketYes,
    ShortPerp,
    LongPerp,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PredictionMarketYes => "PredictionMarketYes",
            Self::ShortPerp => "ShortPerp",
            Self::LongPerp => "LongPerp",
        };
        write!(f, "{s}")
    }
}

/// Execution venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Polymarket,
    Hyperliquid,
    BinanceFutures,
    Gmx,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Polymarket => "Polymarket",
            Self::Hyperliquid => "Hyperliquid",
            Self::BinanceFutures => "BinanceFutures",
            Self::Gmx => "Gmx",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle state. Transitions are guarded by [`PositionState::can_transition_to`]
/// so a position can never run backward (property 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Opening,
    Open,
    Closing,
    Closed,
    Liquidated,
    Failed,
}

impl PositionState {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Liquidated | Self::Failed)
    }

    /// The fixed transition graph:
    /// `Opening -> Open | Failed`, `Open -> Closing | Liquidated`, `Closing -> Closed`.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PositionState::*;
        matches!(
            (self, next),
            (Opening, Open) | (Opening, Failed) | (Open, Closing) | (Open, Liquidated) | (Closing, Closed)
        )
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Opening => "Opening",
            Self::Open => "Open",
            Self::Closing => "Closing",
            Self::Closed => "Closed",
            Self::Liquidated => "Liquidated",
            Self::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// Liquidation-risk classification for an open short perp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationRisk {
    Safe,
    Warning,
    Critical,
}

impl LiquidationRisk {
    /// Classify a loss fraction against the fixed thresholds:
    /// `<= 0.50` Safe, `(0.50, 0.80]` Warning, `> 0.80` Critical.
    pub fn classify(loss_fraction: rust_decimal::Decimal) -> Self {
        use rust_decimal_macros::dec;
        if loss_fraction <= dec!(0.50) {
            Self::Safe
        } else if loss_fraction <= dec!(0.80) {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

/// The core's primary aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgePosition {
    pub id: PositionId,
    /// Venue-assigned id; absent until the venue confirms the open.
    pub external_id: Option<String>,
    pub policy_id: PolicyId,
    pub strategy: StrategyKind,
    pub venue: Venue,
    pub instrument: String,

    pub notional_usd: Usd,
    pub quantity: Size,
    pub entry_price: Price,
    pub collateral_usd: Usd,
    pub leverage: rust_decimal::Decimal,

    pub funding_accrued_usd: Usd,
    pub unrealized_pnl_usd: Usd,
    pub realized_pnl_usd: Option<Usd>,

    pub state: PositionState,

    pub opened_at: DateTime<Utc>,
    pub last_mark_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl HedgePosition {
    #[allow(clippy::too_many_arguments)]
    pub fn new_opening(
        policy_id: PolicyId,
        strategy: StrategyKind,
        venue: Venue,
        instrument: String,
        notional_usd: Usd,
        quantity: Size,
        entry_price: Price,
        collateral_usd: Usd,
        leverage: rust_decimal::Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PositionId::new(),
            external_id: None,
            policy_id,
            strategy,
            venue,
            instrument,
            notional_usd,
            quantity,
            entry_price,
            collateral_usd,
            leverage,
            funding_accrued_usd: Usd::ZERO,
            unrealized_pnl_usd: Usd::ZERO,
            realized_pnl_usd: None,
            state: PositionState::Opening,
            opened_at: now,
            last_mark_at: None,
            closed_at: None,
        }
    }

    /// Apply a state transition, refusing any that run backward. Repository
    /// implementations must apply the same guard at the persistence
    /// boundary.
    pub fn transition_to(&mut self, next: PositionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(CoreError::InvalidConfig(format!(
                "illegal position transition {} -> {}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self.state,
            PositionState::Opening | PositionState::Open | PositionState::Closing
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> HedgePosition {
        HedgePosition::new_opening(
            PolicyId(42),
            StrategyKind::PredictionMarketYes,
            Venue::Polymarket,
            "usdc-depeg-2025".to_string(),
            Usd::new(dec!(20000)),
            Size::new(dec!(100000)),
            Price::new(dec!(0.20)),
            Usd::new(dec!(20000)),
            dec!(1),
            Utc::now(),
        )
    }

    #[test]
    fn valid_forward_transitions_succeed() {
        let mut pos = sample();
        assert!(pos.transition_to(PositionState::Open).is_ok());
        assert!(pos.transition_to(PositionState::Closing).is_ok());
        assert!(pos.transition_to(PositionState::Closed).is_ok());
    }

    #[test]
    fn closed_cannot_return_to_open() {
        let mut pos = sample();
        pos.transition_to(PositionState::Open).unwrap();
        pos.transition_to(PositionState::Closing).unwrap();
        pos.transition_to(PositionState::Closed).unwrap();
        assert!(pos.transition_to(PositionState::Open).is_err());
        assert_eq!(pos.state, PositionState::Closed);
    }

    #[test]
    fn liquidated_and_failed_are_terminal() {
        let mut pos = sample();
        pos.transition_to(PositionState::Open).unwrap();
        pos.transition_to(PositionState::Liquidated).unwrap();
        assert!(pos.state.is_terminal());
        assert!(pos.transition_to(PositionState::Closing).is_err());

        let mut opening = sample();
        opening.transition_to(PositionState::Failed).unwrap();
        assert!(opening.state.is_terminal());
        assert!(opening.transition_to(PositionState::Open).is_err());
    }

    #[test]
    fn liquidation_risk_thresholds_match_spec_boundaries() {
        assert_eq!(LiquidationRisk::classify(dec!(0.50)), LiquidationRisk::Safe);
        assert_eq!(LiquidationRisk::classify(dec!(0.51)), LiquidationRisk::Warning);
        assert_eq!(LiquidationRisk::classify(dec!(0.80)), LiquidationRisk::Warning);
        assert_eq!(LiquidationRisk::classify(dec!(0.81)), LiquidationRisk::Critical);
        assert_eq!(LiquidationRisk::classify(dec!(0.860)), LiquidationRisk::Critical);
    }

    #[test]
    fn loss_fraction_is_critical() {
        // entry=165.50, mark=179.74, leverage=10 -> loss_fraction ~ 0.860
        let entry = dec!(165.50);
        let mark = dec!(179.74);
        let leverage = dec!(10);
        let loss_fraction = leverage * (mark - entry) / entry;
        assert_eq!(LiquidationRisk::classify(loss_fraction), LiquidationRisk::Critical);
    }
}
