//! GMX V2 adapter: subgraph/REST reads against GMX's public markets API.
//! Consulted only for majors, never for the long tail of protocol
//! governance tokens; an unlisted
//! selector reports `MarketNotFound` rather than a fabricated quote.

use async_trait::async_trait;
use chrono::Utc;
use hedge_core::position::Venue;
use hedge_core::{Price, Usd, VenueMarketSnapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing::{debug, info};

use hedge_http::Client;

use crate::adapter::{CloseResult, OrderFill, PlaceOrderRequest, PositionQuery, VenueAdapter};
use crate::error::{Result, VenueError};

/// GMX only lists these index tokens as perp majors; anything else is out
/// of scope for this venue.
const SUPPORTED_MAJORS: &[&str] = &["BTC", "ETH", "SOL"];

pub struct GmxAdapter {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GmxMarketEntry {
    #[serde(rename = "indexToken")]
    index_token: String,
    #[serde(rename = "marketToken")]
    market_token: String,
    #[serde(rename = "maxPrice")]
    max_price: String,
    #[serde(rename = "fundingFactorPerHour")]
    funding_factor_per_hour: String,
    #[serde(rename = "openInterestUsd")]
    open_interest_usd: String,
}

#[derive(Debug, Deserialize)]
struct GmxMarketsResponse {
    markets: Vec<GmxMarketEntry>,
}

impl GmxAdapter {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn is_major(selector: &str) -> bool {
        SUPPORTED_MAJORS.iter().any(|m| m.eq_ignore_ascii_case(selector))
    }

    async fn find_market(&self, selector: &str) -> Result<GmxMarketEntry> {
        if !Self::is_major(selector) {
            debug!(selector, "gmx only serves majors; selector is out of scope");
            return Err(VenueError::MarketNotFound);
        }

        let response: GmxMarketsResponse = self
            .client
            .get_json("/markets", &[])
            .await
            .map_err(VenueError::from)?;

        response
            .markets
            .into_iter()
            .find(|m| m.index_token.eq_ignore_ascii_case(selector))
            .ok_or(VenueError::MarketNotFound)
    }
}

#[async_trait]
impl VenueAdapter for GmxAdapter {
    fn venue(&self) -> Venue {
        Venue::Gmx
    }

    async fn discover_market(&self, selector: &str) -> Result<VenueMarketSnapshot> {
        let market = self.find_market(selector).await?;

        info!(selector, market_token = %market.market_token, "discovered gmx market");

        Ok(VenueMarketSnapshot {
            instrument_id: market.index_token.clone(),
            price: market.max_price.parse().unwrap_or(Price::ZERO),
            funding_rate_hourly: market
                .funding_factor_per_hour
                .parse::<Decimal>()
                .unwrap_or_default(),
            open_interest: Usd::new(market.open_interest_usd.parse().unwrap_or_default()),
            max_leverage: dec!(50),
            observed_at: Utc::now(),
        })
    }

    async fn place_order(&self, _request: PlaceOrderRequest) -> Result<OrderFill> {
        // Order submission against GMX's on-chain router is not supported
        // by this adapter; protocol-short executors fall through to
        // Binance Futures when GMX is the only candidate remaining.
        Err(VenueError::Unsupported(
            "gmx order placement requires on-chain router calls, not implemented".to_string(),
        ))
    }

    async fn close_position(&self, _external_position_id: &str) -> Result<CloseResult> {
        Err(VenueError::Unsupported(
            "gmx position close requires on-chain router calls, not implemented".to_string(),
        ))
    }

    async fn query_position(&self, _external_position_id: &str) -> Result<PositionQuery> {
        Err(VenueError::Unsupported(
            "gmx position query requires on-chain reads, not implemented".to_string(),
        ))
    }

    async fn query_funding_rate(&self, instrument_id: &str) -> Result<Decimal> {
        let snapshot = self.discover_market(instrument_id).await?;
        Ok(snapshot.funding_rate_hourly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_major_accepts_supported_tokens_case_insensitively() {
        assert!(GmxAdapter::is_major("btc"));
        assert!(GmxAdapter::is_major("ETH"));
        assert!(!GmxAdapter::is_major("AAVE"));
    }
}
