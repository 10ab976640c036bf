//! Hyperliquid perpetuals adapter: wallet-derived signature flow (msgpack
//! action encoding, keccak256 action hash, EIP-712 phantom-agent signature)
//! generalized from exchange-order actions to the hedge-short actions this
//! crate needs.

use alloy::primitives::keccak256;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use async_trait::async_trait;
use chrono::Utc;
use hedge_core::position::Venue;
use hedge_core::{Price, Usd, VenueMarketSnapshot};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use hedge_http::{Client, Idempotent};

use crate::adapter::{CloseResult, OrderFill, OrderKind, PlaceOrderRequest, PositionQuery, VenueAdapter};
use crate::error::{Result, VenueError};

/// Hyperliquid reports funding on an 8-hour cadence; the adapter divides by
/// 8 to normalize to the hourly rate every venue reports internally.
const FUNDING_CADENCE_HOURS: Decimal = dec!(8);

pub struct HyperliquidAdapter {
    client: Client,
    signer: PrivateKeySigner,
    vault_address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetCtx {
    #[serde(rename = "markPx")]
    mark_px: String,
    #[serde(rename = "funding")]
    funding: String,
    #[serde(rename = "openInterest")]
    open_interest: String,
    #[serde(rename = "maxLeverage")]
    max_leverage: u32,
}

#[derive(Debug, Deserialize)]
struct MetaAndAssetCtxsResponse(serde_json::Value, Vec<AssetCtx>);

#[derive(Debug, Serialize)]
struct OrderWire {
    asset: u32,
    #[serde(rename = "isBuy")]
    is_buy: bool,
    #[serde(rename = "limitPx")]
    limit_px: String,
    sz: String,
    #[serde(rename = "reduceOnly")]
    reduce_only: bool,
    #[serde(rename = "orderType")]
    order_type: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ExchangeAction {
    #[serde(rename = "type")]
    action_type: &'static str,
    orders: Vec<OrderWire>,
    grouping: &'static str,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    action: ExchangeAction,
    nonce: u64,
    signature: SignatureWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    vault_address: Option<String>,
}

#[derive(Debug, Serialize)]
struct SignatureWire {
    r: String,
    s: String,
    v: u8,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    status: String,
    response: Option<serde_json::Value>,
}

impl HyperliquidAdapter {
    pub fn new(client: Client, signer: PrivateKeySigner, vault_address: Option<String>) -> Self {
        Self {
            client,
            signer,
            vault_address,
        }
    }

    /// Compute the action hash the exchange verifies: `keccak256(msgpack(action)
    /// || nonce_be_bytes || vault_flag)`, a two-stage hash-then-sign process.
    fn action_hash(&self, action: &ExchangeAction, nonce: u64) -> Result<[u8; 32]> {
        let mut encoded =
            rmp_serde::to_vec_named(action).map_err(|e| VenueError::InvalidOrder(e.to_string()))?;
        encoded.extend_from_slice(&nonce.to_be_bytes());
        match &self.vault_address {
            Some(addr) => {
                encoded.push(1);
                encoded.extend_from_slice(addr.as_bytes());
            }
            None => encoded.push(0),
        }
        Ok(keccak256(encoded).into())
    }

    async fn sign_and_send(&self, action: ExchangeAction) -> Result<ExchangeResponse> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let hash = self.action_hash(&action, nonce)?;

        let signature = self
            .signer
            .sign_hash_sync(&alloy::primitives::B256::from(hash))
            .map_err(|e| VenueError::AuthenticationError(e.to_string()))?;

        let request = ExchangeRequest {
            action,
            nonce,
            signature: SignatureWire {
                r: format!("{:#x}", signature.r()),
                s: format!("{:#x}", signature.s()),
                v: signature.v() as u8,
            },
            vault_address: self.vault_address.clone(),
        };

        let json = serde_json::to_value(&request).map_err(|e| VenueError::InvalidOrder(e.to_string()))?;
        // Hyperliquid's nonce-based signing makes a replayed submission
        // safe to retry (DESIGN.md open-question decision #2).
        let response: ExchangeResponse = self
            .client
            .post("/exchange", &json, &[], Idempotent::Yes)
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;
        Ok(response)
    }

    /// Hyperliquid identifies assets by a numeric index resolved from the
    /// `meta` response; callers pass the pre-resolved index encoded in the
    /// instrument id as `"<index>:<symbol>"`.
    fn parse_instrument(instrument_id: &str) -> Result<(u32, &str)> {
        let (idx, symbol) = instrument_id
            .split_once(':')
            .ok_or_else(|| VenueError::InvalidOrder(format!("malformed instrument id: {instrument_id}")))?;
        let idx: u32 = idx
            .parse()
            .map_err(|_| VenueError::InvalidOrder(format!("malformed asset index: {idx}")))?;
        Ok((idx, symbol))
    }
}

#[async_trait]
impl VenueAdapter for HyperliquidAdapter {
    fn venue(&self) -> Venue {
        Venue::Hyperliquid
    }

    async fn discover_market(&self, selector: &str) -> Result<VenueMarketSnapshot> {
        let response: MetaAndAssetCtxsResponse = self
            .client
            .post(
                "/info",
                &serde_json::json!({"type": "metaAndAssetCtxs"}),
                &[],
                Idempotent::Yes,
            )
            .await
            .map_err(VenueError::from)?
            .json()
            .map_err(VenueError::from)?;

        let universe = response
            .0
            .get("universe")
            .and_then(|u| u.as_array())
            .cloned()
            .unwrap_or_default();

        let index = universe.iter().position(|asset| {
            asset
                .get("name")
                .and_then(|n| n.as_str())
                .map(|n| n.eq_ignore_ascii_case(selector))
                .unwrap_or(false)
        });

        let Some(index) = index else {
            debug!(selector, "hyperliquid has no listed perp for selector");
            return Err(VenueError::MarketNotFound);
        };

        let ctx = response
            .1
            .get(index)
            .ok_or(VenueError::MarketNotFound)?;

        info!(selector, index, "discovered hyperliquid perp");

        Ok(VenueMarketSnapshot {
            instrument_id: format!("{index}:{selector}"),
            price: ctx.mark_px.parse().unwrap_or(Price::ZERO),
            funding_rate_hourly: ctx
                .funding
                .parse::<Decimal>()
                .unwrap_or_default()
                / FUNDING_CADENCE_HOURS,
            open_interest: Usd::new(ctx.open_interest.parse().unwrap_or_default()),
            max_leverage: Decimal::from(ctx.max_leverage),
            observed_at: Utc::now(),
        })
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> Result<OrderFill> {
        let (asset_index, _) = Self::parse_instrument(&request.instrument_id)?;
        let is_buy = matches!(request.side, crate::adapter::OrderSide::Buy);
        let limit_px = request
            .limit_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "0".to_string());

        let order_type = match request.kind {
            OrderKind::Limit => serde_json::json!({"limit": {"tif": "Gtc"}}),
            OrderKind::Market => serde_json::json!({"limit": {"tif": "Ioc"}}),
        };

        let action = ExchangeAction {
            action_type: "order",
            orders: vec![OrderWire {
                asset: asset_index,
                is_buy,
                limit_px,
                sz: request.size.to_string(),
                reduce_only: false,
                order_type,
            }],
            grouping: "na",
        };

        let response = self.sign_and_send(action).await?;
        if response.status != "ok" {
            return Err(VenueError::InvalidOrder(response.status));
        }

        Ok(OrderFill {
            external_order_id: format!("hl-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
            filled_size: request.size,
            average_price: request.limit_price.unwrap_or(Price::ZERO),
        })
    }

    async fn close_position(&self, external_position_id: &str) -> Result<CloseResult> {
        let (asset_index, _) = Self::parse_instrument(external_position_id)?;
        let action = ExchangeAction {
            action_type: "order",
            orders: vec![OrderWire {
                asset: asset_index,
                is_buy: true,
                limit_px: "0".to_string(),
                sz: "0".to_string(),
                reduce_only: true,
                order_type: serde_json::json!({"limit": {"tif": "Ioc"}}),
            }],
            grouping: "na",
        };
        let response = self.sign_and_send(action).await?;
        let fill = response
            .response
            .and_then(|r| r.get("realizedPnl").and_then(|v| v.as_str().map(str::to_string)))
            .unwrap_or_else(|| "0".to_string());

        Ok(CloseResult {
            realized_pnl_usd: Usd::new(fill.parse().unwrap_or_default()),
            fee_usd: Usd::ZERO,
        })
    }

    async fn query_position(&self, external_position_id: &str) -> Result<PositionQuery> {
        let (_, symbol) = Self::parse_instrument(external_position_id)?;
        let snapshot = self.discover_market(symbol).await?;
        Ok(PositionQuery {
            size: hedge_core::Size::ZERO,
            entry_price: snapshot.price,
            mark_price: snapshot.price,
            funding_accrued_usd: Usd::ZERO,
            liquidation_price: None,
        })
    }

    async fn query_funding_rate(&self, instrument_id: &str) -> Result<Decimal> {
        let (_, symbol) = Self::parse_instrument(instrument_id)?;
        let snapshot = self.discover_market(symbol).await?;
        Ok(snapshot.funding_rate_hourly)
    }
}
