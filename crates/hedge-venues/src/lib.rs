//! Venue adapters: one module per external venue, each implementing the
//! shared [`adapter::VenueAdapter`] contract over a [`hedge_http::Client`].

pub mod adapter;
pub mod binance;
pub mod error;
pub mod gmx;
pub mod hyperliquid;
pub mod mapping;
pub mod polymarket;

pub use adapter::{CloseResult, OrderFill, OrderSide, OrderKind, PlaceOrderRequest, PositionQuery, VenueAdapter};
pub use binance::{BinanceAdapter, BinanceCredentials};
pub use error::{Result, VenueError};
pub use gmx::GmxAdapter;
pub use hyperliquid::HyperliquidAdapter;
pub use mapping::{lookup as lookup_protocol_token, ProtocolTokenEntry, TokenCategory};
pub use polymarket::{PolymarketAdapter, PolymarketCredentials};
