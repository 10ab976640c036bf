//! Polymarket CLOB adapter: binary-outcome prediction markets priced in
//! `[0, 1]`. REST client shape follows a typed `reqwest` wrapper with
//! heavy `tracing` instrumentation; HMAC request signing follows the same
//! `hmac`/`sha2` idiom used for the Binance adapter in this crate.

use async_trait::async_trait;
use chrono::Utc;
use hedge_core::position::Venue;
use hedge_core::{Price, Usd, VenueMarketSnapshot};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use hedge_http::{Client, Idempotent};

use crate::adapter::{CloseResult, OrderFill, OrderKind, PlaceOrderRequest, PositionQuery, VenueAdapter};
use crate::error::{Result, VenueError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct PolymarketCredentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
    pub passphrase: Zeroizing<String>,
}

pub struct PolymarketAdapter {
    client: Client,
    credentials: PolymarketCredentials,
}

#[derive(Debug, Deserialize)]
struct MarketSearchResponse {
    markets: Vec<MarketEntry>,
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    condition_id: String,
    question: String,
    #[serde(default)]
    closed: bool,
    end_date_iso: String,
    tokens: Vec<OutcomeToken>,
    #[serde(default)]
    liquidity_num: f64,
}

#[derive(Debug, Deserialize)]
struct OutcomeToken {
    token_id: String,
    outcome: String,
    price: f64,
}

#[derive(Debug, Serialize)]
struct PlaceOrderPayload {
    market: String,
    token_id: String,
    side: &'static str,
    price: String,
    size: String,
    order_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct PlaceOrderResponse {
    order_id: String,
    #[serde(default)]
    filled_size: String,
    #[serde(default)]
    average_price: String,
}

#[derive(Debug, Deserialize)]
struct ClosePositionResponse {
    realized_pnl: String,
    fee: String,
}

#[derive(Debug, Deserialize)]
struct PositionResponse {
    size: String,
    entry_price: String,
    mark_price: String,
}

impl PolymarketAdapter {
    pub fn new(client: Client, credentials: PolymarketCredentials) -> Self {
        Self { client, credentials }
    }

    /// HMAC-SHA256 over `timestamp + method + path + body`, the CLOB's
    /// signature scheme for authenticated endpoints.
    fn sign(&self, timestamp: i64, method: &str, path: &str, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| VenueError::AuthenticationError(e.to_string()))?;
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn auth_headers(&self, method: &str, path: &str, body: &str) -> Result<Vec<(String, String)>> {
        let timestamp = Utc::now().timestamp();
        let signature = self.sign(timestamp, method, path, body)?;
        Ok(vec![
            ("POLY-API-KEY".to_string(), self.credentials.api_key.clone()),
            ("POLY-PASSPHRASE".to_string(), self.credentials.passphrase.to_string()),
            ("POLY-TIMESTAMP".to_string(), timestamp.to_string()),
            ("POLY-SIGNATURE".to_string(), signature),
        ])
    }

    /// Search binary markets whose question references `selector`
    /// (the protected asset symbol) and rank the depeg-style candidates
    /// by profitable YES price and liquidity.
    async fn search_markets(&self, selector: &str) -> Result<Vec<MarketEntry>> {
        let path = format!("/markets?search={}", selector.to_lowercase());
        let response: MarketSearchResponse = self
            .client
            .get_json(&path, &[])
            .await
            .map_err(VenueError::from)?;
        Ok(response.markets)
    }
}

#[async_trait]
impl VenueAdapter for PolymarketAdapter {
    fn venue(&self) -> Venue {
        Venue::Polymarket
    }

    async fn discover_market(&self, selector: &str) -> Result<VenueMarketSnapshot> {
        let markets = self.search_markets(selector).await?;

        let best = markets
            .into_iter()
            .filter(|m| !m.closed)
            .filter_map(|m| {
                let yes = m.tokens.iter().find(|t| t.outcome.eq_ignore_ascii_case("YES"))?;
                Some((m, yes.token_id.clone(), yes.price))
            })
            .filter(|(_, _, yes_price)| *yes_price > 0.0 && *yes_price < 0.30)
            .max_by(|(a, _, _), (b, _, _)| {
                a.liquidity_num
                    .partial_cmp(&b.liquidity_num)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

        let Some((market, token_id, yes_price)) = best else {
            debug!(selector, "no qualifying depeg-style market found");
            return Err(VenueError::MarketNotFound);
        };

        info!(market = %market.question, token_id = %token_id, yes_price, "discovered polymarket candidate");

        Ok(VenueMarketSnapshot {
            instrument_id: token_id,
            price: Price::new(Decimal::try_from(yes_price).unwrap_or_default()),
            funding_rate_hourly: Decimal::ZERO,
            open_interest: Usd::new(Decimal::try_from(market.liquidity_num).unwrap_or_default()),
            max_leverage: Decimal::ONE,
            observed_at: Utc::now(),
        })
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderFill> {
        let side = match request.kind {
            OrderKind::Limit => "BUY",
            OrderKind::Market => "BUY",
        };
        let price = request
            .limit_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "1".to_string());
        let payload = PlaceOrderPayload {
            market: request.instrument_id.clone(),
            token_id: request.instrument_id.clone(),
            side,
            price,
            size: request.size.to_string(),
            order_type: match request.kind {
                OrderKind::Limit => "GTC",
                OrderKind::Market => "FOK",
            },
        };
        let body = serde_json::to_string(&payload).map_err(|e| VenueError::InvalidOrder(e.to_string()))?;
        let headers = self.auth_headers("POST", "/order", &body)?;
        let json = serde_json::to_value(&payload).map_err(|e| VenueError::InvalidOrder(e.to_string()))?;

        // Order placement retries only when the venue honors an
        // idempotency key; the CLOB does not, so a single attempt.
        let response: PlaceOrderResponse = self
            .client
            .post("/order", &json, &headers, Idempotent::No)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        Ok(OrderFill {
            external_order_id: response.order_id,
            filled_size: response.filled_size.parse().unwrap_or(request.size),
            average_price: response
                .average_price
                .parse()
                .unwrap_or_else(|_| request.limit_price.unwrap_or(Price::ZERO)),
        })
    }

    async fn close_position(&self, external_position_id: &str) -> Result<CloseResult> {
        let path = format!("/positions/{external_position_id}/close");
        let headers = self.auth_headers("POST", &path, "")?;
        let response: ClosePositionResponse = self
            .client
            .post(&path, &serde_json::json!({}), &headers, Idempotent::Yes)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        Ok(CloseResult {
            realized_pnl_usd: Usd::new(response.realized_pnl.parse().unwrap_or_default()),
            fee_usd: Usd::new(response.fee.parse().unwrap_or_default()),
        })
    }

    async fn query_position(&self, external_position_id: &str) -> Result<PositionQuery> {
        let path = format!("/positions/{external_position_id}");
        let headers = self.auth_headers("GET", &path, "")?;
        let response: PositionResponse = self
            .client
            .get(&path, &headers)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        Ok(PositionQuery {
            size: response.size.parse().unwrap_or(hedge_core::Size::ZERO),
            entry_price: response.entry_price.parse().unwrap_or(Price::ZERO),
            mark_price: response.mark_price.parse().unwrap_or(Price::ZERO),
            funding_accrued_usd: Usd::ZERO,
            liquidation_price: None,
        })
    }

    async fn query_funding_rate(&self, _instrument_id: &str) -> Result<Decimal> {
        // Prediction-market YES shares carry no funding.
        Ok(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let creds = PolymarketCredentials {
            api_key: "k".to_string(),
            api_secret: Zeroizing::new("s".to_string()),
            passphrase: Zeroizing::new("p".to_string()),
        };
        let client = Client::new(hedge_http::ClientConfig {
            endpoints: vec!["https://clob.polymarket.com".to_string()],
            ..Default::default()
        })
        .unwrap();
        let adapter = PolymarketAdapter::new(client, creds);
        let sig1 = adapter.sign(1000, "POST", "/order", "{}").unwrap();
        let sig2 = adapter.sign(1000, "POST", "/order", "{}").unwrap();
        assert_eq!(sig1, sig2);
    }
}
