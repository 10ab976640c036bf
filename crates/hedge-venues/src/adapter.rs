//! Shared adapter contract: every venue implements the same
//! operation set so strategy executors can iterate over an ordered list of
//! adapters and short-circuit on the first success, a capability-set
//! abstraction rather than a hand-rolled match over venue enums.

use async_trait::async_trait;
use hedge_core::position::Venue;
use hedge_core::{Price, Size, Usd, VenueMarketSnapshot};
use rust_decimal::Decimal;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Limit,
    Market,
}

#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub instrument_id: String,
    pub side: OrderSide,
    pub size: Size,
    /// Leverage applied for perp venues; ignored by Polymarket (outcome
    /// shares carry no leverage).
    pub leverage: Decimal,
    pub kind: OrderKind,
    /// Limit price; required when `kind == Limit`, ignored for `Market`.
    pub limit_price: Option<Price>,
}

#[derive(Debug, Clone)]
pub struct OrderFill {
    pub external_order_id: String,
    pub filled_size: Size,
    pub average_price: Price,
}

#[derive(Debug, Clone)]
pub struct CloseResult {
    pub realized_pnl_usd: Usd,
    pub fee_usd: Usd,
}

#[derive(Debug, Clone)]
pub struct PositionQuery {
    pub size: Size,
    pub entry_price: Price,
    pub mark_price: Price,
    pub funding_accrued_usd: Usd,
    pub liquidation_price: Option<Price>,
}

/// Operations a venue adapter exposes. An adapter that does not support an
/// operation returns `VenueError::Unsupported` rather than a fabricated
/// fallback.
#[cfg_attr(feature = "test-util", mockall::automock)]
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    fn venue(&self) -> Venue;

    /// Discover a market/instrument for a token or instrument selector.
    /// Returns `VenueError::MarketNotFound` rather than fabricating a
    /// fallback when the venue does not list the instrument.
    async fn discover_market(&self, selector: &str) -> Result<VenueMarketSnapshot>;

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderFill>;

    /// Idempotent: a duplicate call with the same external id returns the
    /// same realized P&L without opening a second offsetting order.
    async fn close_position(&self, external_position_id: &str) -> Result<CloseResult>;

    async fn query_position(&self, external_position_id: &str) -> Result<PositionQuery>;

    /// Hourly-normalized funding rate (8-hour venues divide by 8).
    async fn query_funding_rate(&self, instrument_id: &str) -> Result<Decimal>;
}
