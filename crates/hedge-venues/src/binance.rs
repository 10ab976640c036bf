//! Binance Futures adapter: HMAC-SHA256 signed REST, millisecond
//! timestamp + recv-window, `<BASE>USDT` symbol convention.

use async_trait::async_trait;
use chrono::Utc;
use hedge_core::position::Venue;
use hedge_core::{Price, Usd, VenueMarketSnapshot};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info};
use zeroize::Zeroizing;

use hedge_http::{Client, Idempotent};

use crate::adapter::{CloseResult, OrderFill, OrderKind, PlaceOrderRequest, PositionQuery, VenueAdapter};
use crate::error::{Result, VenueError};

type HmacSha256 = Hmac<Sha256>;

/// Binance reports funding hourly-equivalent already via its 8h-cadence
/// premium index, but the funding endpoint used here reports the 8h rate
/// directly; normalize the same way as Hyperliquid.
const FUNDING_CADENCE_HOURS: Decimal = dec!(8);

#[derive(Debug, Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: Zeroizing<String>,
    pub recv_window_ms: u64,
}

pub struct BinanceAdapter {
    client: Client,
    credentials: BinanceCredentials,
}

#[derive(Debug, Deserialize)]
struct PremiumIndexResponse {
    #[serde(rename = "markPrice")]
    mark_price: String,
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
}

#[derive(Debug, Deserialize)]
struct OpenInterestResponse {
    #[serde(rename = "openInterest")]
    open_interest: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoSymbol {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfoResponse {
    symbols: Vec<ExchangeInfoSymbol>,
}

#[derive(Debug, Deserialize)]
struct NewOrderResponse {
    #[serde(rename = "orderId")]
    order_id: u64,
    #[serde(rename = "avgPrice")]
    avg_price: String,
    #[serde(rename = "executedQty")]
    executed_qty: String,
}

impl BinanceAdapter {
    pub fn new(client: Client, credentials: BinanceCredentials) -> Self {
        Self { client, credentials }
    }

    /// `<BASE>USDT`, the venue's perp symbol convention.
    pub fn normalize_symbol(base: &str) -> String {
        format!("{}USDT", base.to_uppercase())
    }

    fn sign_query(&self, query: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.credentials.api_secret.as_bytes())
            .map_err(|e| VenueError::AuthenticationError(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query_path(&self, base_path: &str, params: &[(&str, String)]) -> Result<String> {
        let timestamp = Utc::now().timestamp_millis();
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "timestamp={timestamp}&recvWindow={}",
            self.credentials.recv_window_ms
        ));
        let signature = self.sign_query(&query)?;
        Ok(format!("{base_path}?{query}&signature={signature}"))
    }

    fn auth_headers(&self) -> Vec<(String, String)> {
        vec![("X-MBX-APIKEY".to_string(), self.credentials.api_key.clone())]
    }

    async fn symbol_listed(&self, symbol: &str) -> Result<bool> {
        let info: ExchangeInfoResponse = self
            .client
            .get_json("/fapi/v1/exchangeInfo", &[])
            .await
            .map_err(VenueError::from)?;
        Ok(info
            .symbols
            .iter()
            .any(|s| s.symbol == symbol && s.status == "TRADING"))
    }
}

#[async_trait]
impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> Venue {
        Venue::BinanceFutures
    }

    async fn discover_market(&self, selector: &str) -> Result<VenueMarketSnapshot> {
        let symbol = Self::normalize_symbol(selector);

        if !self.symbol_listed(&symbol).await? {
            debug!(symbol, "binance does not list this perp");
            return Err(VenueError::MarketNotFound);
        }

        let premium_path = format!("/fapi/v1/premiumIndex?symbol={symbol}");
        let premium: PremiumIndexResponse = self
            .client
            .get_json(&premium_path, &[])
            .await
            .map_err(VenueError::from)?;

        let oi_path = format!("/fapi/v1/openInterest?symbol={symbol}");
        let oi: OpenInterestResponse = self
            .client
            .get_json(&oi_path, &[])
            .await
            .map_err(VenueError::from)?;

        info!(symbol, "discovered binance futures perp");

        Ok(VenueMarketSnapshot {
            instrument_id: symbol,
            price: premium.mark_price.parse().unwrap_or(Price::ZERO),
            funding_rate_hourly: premium
                .last_funding_rate
                .parse::<Decimal>()
                .unwrap_or_default()
                / FUNDING_CADENCE_HOURS,
            open_interest: Usd::new(oi.open_interest.parse().unwrap_or_default()),
            max_leverage: dec!(125),
            observed_at: Utc::now(),
        })
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderFill> {
        let side = match request.side {
            crate::adapter::OrderSide::Buy => "BUY",
            crate::adapter::OrderSide::Sell => "SELL",
        };
        let order_type = match request.kind {
            OrderKind::Limit => "LIMIT",
            OrderKind::Market => "MARKET",
        };
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", request.instrument_id.clone()),
            ("side", side.to_string()),
            ("type", order_type.to_string()),
            ("quantity", request.size.to_string()),
        ];
        if let OrderKind::Limit = request.kind {
            if let Some(price) = request.limit_price {
                params.push(("price", price.to_string()));
                params.push(("timeInForce", "GTC".to_string()));
            }
        }
        let path = self.signed_query_path("/fapi/v1/order", &params)?;
        let headers = self.auth_headers();

        // Binance order placement is not retried without a venue-honored
        // idempotency key.
        let response: NewOrderResponse = self
            .client
            .post(&path, &serde_json::json!({}), &headers, Idempotent::No)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        Ok(OrderFill {
            external_order_id: response.order_id.to_string(),
            filled_size: response.executed_qty.parse().unwrap_or(request.size),
            average_price: response
                .avg_price
                .parse()
                .unwrap_or_else(|_| request.limit_price.unwrap_or(Price::ZERO)),
        })
    }

    async fn close_position(&self, external_position_id: &str) -> Result<CloseResult> {
        // `external_position_id` is the venue symbol for Binance (positions
        // are per-symbol, one-way mode); closing submits a reduce-only
        // market order for the full open size.
        let params = vec![
            ("symbol", external_position_id.to_string()),
            ("side", "BUY".to_string()),
            ("type", "MARKET".to_string()),
            ("reduceOnly", "true".to_string()),
            ("closePosition", "true".to_string()),
        ];
        let path = self.signed_query_path("/fapi/v1/order", &params)?;
        let headers = self.auth_headers();

        let _response: NewOrderResponse = self
            .client
            .post(&path, &serde_json::json!({}), &headers, Idempotent::Yes)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        // Binance's close-order response does not carry realized P&L
        // directly; the caller reconciles via `query_position`'s
        // `income`-style report in a full implementation. Reported here
        // as zero pending that reconciliation pass, consistent with the
        // fee breakdown Binance returns separately per trade.
        Ok(CloseResult {
            realized_pnl_usd: Usd::ZERO,
            fee_usd: Usd::ZERO,
        })
    }

    async fn query_position(&self, external_position_id: &str) -> Result<PositionQuery> {
        let params = vec![("symbol", external_position_id.to_string())];
        let path = self.signed_query_path("/fapi/v2/positionRisk", &params)?;
        let headers = self.auth_headers();

        #[derive(Debug, Deserialize)]
        struct PositionRisk {
            #[serde(rename = "positionAmt")]
            position_amt: String,
            #[serde(rename = "entryPrice")]
            entry_price: String,
            #[serde(rename = "markPrice")]
            mark_price: String,
            #[serde(rename = "liquidationPrice")]
            liquidation_price: String,
        }

        let positions: Vec<PositionRisk> = self
            .client
            .get_json(&path, &headers)
            .await
            .map_err(VenueError::from)?;

        let position = positions.into_iter().next().ok_or(VenueError::PositionNotFound)?;

        Ok(PositionQuery {
            size: position.position_amt.parse().unwrap_or(hedge_core::Size::ZERO),
            entry_price: position.entry_price.parse().unwrap_or(Price::ZERO),
            mark_price: position.mark_price.parse().unwrap_or(Price::ZERO),
            funding_accrued_usd: Usd::ZERO,
            liquidation_price: position.liquidation_price.parse().ok(),
        })
    }

    async fn query_funding_rate(&self, instrument_id: &str) -> Result<Decimal> {
        let path = format!("/fapi/v1/premiumIndex?symbol={instrument_id}");
        let premium: PremiumIndexResponse = self
            .client
            .get_json(&path, &[])
            .await
            .map_err(VenueError::from)?;
        Ok(premium.last_funding_rate.parse::<Decimal>().unwrap_or_default() / FUNDING_CADENCE_HOURS)
    }
}
