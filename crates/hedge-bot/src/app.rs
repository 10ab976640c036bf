//! Wiring: turns an `AppConfig` into the running pair of long-lived tasks.
//! Constructs one `hedge_http::Client` per venue, wraps each in its
//! venue adapter, builds the `hedge_strategy` executors over the adapter
//! set, and spawns the orchestrator loop and the lifecycle loop as two
//! independent tasks sharing only the repository handle and the
//! event-stream sender — neither loop holds a reference to the other.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, warn};

use dashmap::DashMap;
use hedge_core::{Clock, PolicyId, Price, SystemClock, Usd, VenueMarketSnapshot};
use hedge_orchestrator::{AtomicControl, Orchestrator, OrchestratorConfig as CoreOrchestratorConfig};
use hedge_position::{LifecycleConfig as CoreLifecycleConfig, LifecycleManager};
use hedge_repository::{InMemoryRepository, Repository};
use hedge_strategy::{CexCorrelationExecutor, DepegExecutor, HedgeRatios, ProtocolShortExecutor};
use hedge_telemetry::events::HedgeEvent;
use hedge_venues::adapter::{CloseResult, OrderFill, PlaceOrderRequest, PositionQuery, VenueAdapter};
use hedge_venues::{BinanceAdapter, BinanceCredentials, GmxAdapter, HyperliquidAdapter, PolymarketAdapter, PolymarketCredentials};
use zeroize::Zeroizing;

use crate::config::{AppConfig, OperatingMode};
use crate::error::{BotError, BotResult};

/// Wraps a venue adapter so `Observation` mode never places or closes a
/// real order — an explicit, configured mode, not a swallowed error or a
/// fabricated fill. Every read-only operation passes straight through.
struct DryRunAdapter {
    inner: Arc<dyn VenueAdapter>,
}

#[async_trait]
impl VenueAdapter for DryRunAdapter {
    fn venue(&self) -> hedge_core::position::Venue {
        self.inner.venue()
    }

    async fn discover_market(&self, selector: &str) -> hedge_venues::Result<VenueMarketSnapshot> {
        self.inner.discover_market(selector).await
    }

    async fn place_order(&self, request: PlaceOrderRequest) -> hedge_venues::Result<OrderFill> {
        info!(venue = ?self.inner.venue(), instrument = %request.instrument_id, size = %request.size, "observation mode: order not submitted");
        Ok(OrderFill {
            external_order_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            filled_size: request.size,
            average_price: request.limit_price.unwrap_or(Price::new(Decimal::ZERO)),
        })
    }

    async fn close_position(&self, external_position_id: &str) -> hedge_venues::Result<CloseResult> {
        info!(external_position_id, "observation mode: close not submitted");
        Ok(CloseResult {
            realized_pnl_usd: Usd::ZERO,
            fee_usd: Usd::ZERO,
        })
    }

    async fn query_position(&self, external_position_id: &str) -> hedge_venues::Result<PositionQuery> {
        self.inner.query_position(external_position_id).await
    }

    async fn query_funding_rate(&self, instrument_id: &str) -> hedge_venues::Result<Decimal> {
        self.inner.query_funding_rate(instrument_id).await
    }
}

fn load_private_key(env_var: &str) -> BotResult<PrivateKeySigner> {
    let hex_str: Zeroizing<String> =
        Zeroizing::new(std::env::var(env_var).map_err(|_| BotError::Config(format!("{env_var} is not set")))?);
    let bytes: Zeroizing<Vec<u8>> =
        Zeroizing::new(hex::decode(hex_str.trim_start_matches("0x")).map_err(|e| BotError::Config(e.to_string()))?);
    PrivateKeySigner::from_slice(&bytes).map_err(|e| BotError::Config(e.to_string()))
}

fn wrap_for_mode(mode: OperatingMode, adapter: Arc<dyn VenueAdapter>) -> Arc<dyn VenueAdapter> {
    match mode {
        OperatingMode::Trading => adapter,
        OperatingMode::Observation => Arc::new(DryRunAdapter { inner: adapter }),
    }
}

/// The running application: owns the shared event bus and the two
/// long-lived task handles. Shutdown is cooperative — dropping `Application`
/// aborts both tasks.
pub struct Application {
    orchestrator_handle: tokio::task::JoinHandle<()>,
    lifecycle_handle: tokio::task::JoinHandle<()>,
    events: broadcast::Sender<HedgeEvent>,
    control: AtomicControl,
}

impl Application {
    pub async fn build(config: AppConfig) -> BotResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let repo: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
        let (events_tx, _events_rx) = hedge_telemetry::events::channel();

        let polymarket_client = hedge_http::Client::new(config.venues.polymarket.client_config(
            &config.http_defaults,
            &["https://clob.polymarket.com"],
        ))?;
        let polymarket_creds = PolymarketCredentials {
            api_key: config.venues.polymarket.api_key.clone().unwrap_or_default(),
            api_secret: Zeroizing::new(config.venues.polymarket.api_secret.clone().unwrap_or_default()),
            passphrase: Zeroizing::new(config.venues.polymarket.passphrase.clone().unwrap_or_default()),
        };
        let polymarket: Arc<dyn VenueAdapter> = wrap_for_mode(
            config.operating_mode,
            Arc::new(PolymarketAdapter::new(polymarket_client, polymarket_creds)),
        );

        let hyperliquid_client = hedge_http::Client::new(config.venues.hyperliquid.client_config(
            &config.http_defaults,
            &["https://api.hyperliquid.xyz"],
        ))?;
        let hyperliquid_signer = match &config.venues.hyperliquid.private_key_env_var {
            Some(var) => load_private_key(var)?,
            None => {
                warn!("no hyperliquid.private_key_env_var configured; generating an ephemeral signer (Observation mode only)");
                PrivateKeySigner::random()
            }
        };
        let hyperliquid: Arc<dyn VenueAdapter> = wrap_for_mode(
            config.operating_mode,
            Arc::new(HyperliquidAdapter::new(
                hyperliquid_client,
                hyperliquid_signer,
                config.venues.hyperliquid.wallet_address.clone(),
            )),
        );

        let binance_client = hedge_http::Client::new(config.venues.binance.client_config(
            &config.http_defaults,
            &["https://fapi.binance.com"],
        ))?;
        let binance_creds = BinanceCredentials {
            api_key: config.venues.binance.api_key.clone().unwrap_or_default(),
            api_secret: Zeroizing::new(config.venues.binance.api_secret.clone().unwrap_or_default()),
            recv_window_ms: 5000,
        };
        let binance: Arc<dyn VenueAdapter> = wrap_for_mode(
            config.operating_mode,
            Arc::new(BinanceAdapter::new(binance_client, binance_creds)),
        );

        let gmx_client = hedge_http::Client::new(config.venues.gmx.client_config(
            &config.http_defaults,
            &["https://arbitrum-api.gmxinfra.io"],
        ))?;
        let gmx: Arc<dyn VenueAdapter> = wrap_for_mode(config.operating_mode, Arc::new(GmxAdapter::new(gmx_client)));

        let ratios: HedgeRatios = (&config.hedge_ratios).into();

        let depeg = DepegExecutor::new(polymarket.clone(), ratios.clone(), clock.clone());
        let protocol_short = ProtocolShortExecutor::new(
            vec![hyperliquid.clone(), gmx.clone(), binance.clone()],
            ratios.clone(),
            clock.clone(),
        );
        let cex_correlation = CexCorrelationExecutor::new(binance.clone(), ratios, clock.clone());

        let control = AtomicControl::new(config.orchestrator.pause_new_openings);

        let orchestrator = Arc::new(Orchestrator::new(
            repo.clone(),
            clock.clone(),
            events_tx.clone(),
            control.clone(),
            CoreOrchestratorConfig {
                budget: config.orchestrator.budget(),
                loop_period: config.orchestrator.loop_period(),
                iteration_deadline: config.orchestrator.iteration_deadline(),
            },
            depeg,
            protocol_short,
            cex_correlation,
        ));

        let mut adapters: HashMap<hedge_core::position::Venue, Arc<dyn VenueAdapter>> = HashMap::new();
        adapters.insert(hedge_core::position::Venue::Polymarket, polymarket);
        adapters.insert(hedge_core::position::Venue::Hyperliquid, hyperliquid);
        adapters.insert(hedge_core::position::Venue::BinanceFutures, binance);
        adapters.insert(hedge_core::position::Venue::Gmx, gmx);

        let lifecycle = Arc::new(LifecycleManager::new(
            repo.clone(),
            adapters,
            clock,
            events_tx.clone(),
            CoreLifecycleConfig {
                loop_period: config.lifecycle.loop_period(),
            },
        ));

        let mut logger_rx = events_tx.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = logger_rx.recv().await {
                info!(?event, "hedge event");
            }
        });

        // Shared, read-concurrent cache of which in-flight policies demand a
        // close (expired/claimed), refreshed once per lifecycle tick by a
        // dedicated poller task so the lifecycle loop's close-enqueue
        // closure stays synchronous rather than reaching back into the
        // repository mid-cycle. This cache is local to the binary's wiring,
        // not a library-crate global.
        let demands_close: Arc<DashMap<PolicyId, bool>> = Arc::new(DashMap::new());
        let poller_repo = repo.clone();
        let poller_cache = demands_close.clone();
        let poller_period = config.lifecycle.loop_period();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller_period);
            loop {
                ticker.tick().await;
                match poller_repo.load_active_policies().await {
                    Ok(policies) => {
                        poller_cache.clear();
                        for policy in policies {
                            poller_cache.insert(policy.id, policy.status.demands_close());
                        }
                    }
                    Err(err) => warn!(error = %err, "policy poller failed to refresh close cache"),
                }
            }
        });

        let orchestrator_handle = tokio::spawn(async move {
            orchestrator.run().await;
        });
        let lifecycle_handle = tokio::spawn(async move {
            lifecycle
                .run(move |policy_id| demands_close.get(&policy_id).map(|v| *v).unwrap_or(true))
                .await;
        });

        Ok(Self {
            orchestrator_handle,
            lifecycle_handle,
            events: events_tx,
            control,
        })
    }

    pub fn events(&self) -> broadcast::Sender<HedgeEvent> {
        self.events.clone()
    }

    pub fn control(&self) -> AtomicControl {
        self.control.clone()
    }

    /// Block until either long-lived task exits (which, barring a panic,
    /// only happens on process shutdown) or a ctrl-C signal arrives.
    pub async fn run_until_shutdown(self) -> BotResult<()> {
        tokio::select! {
            result = self.orchestrator_handle => {
                if let Err(err) = result {
                    warn!(error = %err, "orchestrator task exited");
                }
            }
            result = self.lifecycle_handle => {
                if let Err(err) = result {
                    warn!(error = %err, "lifecycle task exited");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
            }
        }
        Ok(())
    }
}
