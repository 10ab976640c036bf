//! Hedge orchestrator binary crate: configuration, wiring, `main`.
//!
//! Owns no domain logic of its own — every behavior named in the
//! specification lives in `hedge-core`, `hedge-http`, `hedge-venues`,
//! `hedge-strategy`, `hedge-position`, `hedge-orchestrator`, and
//! `hedge-repository`. This crate only constructs those pieces from an
//! `AppConfig` and spawns the two long-lived loops.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{BotError, BotResult};
