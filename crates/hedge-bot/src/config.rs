//! Application configuration. Nested-struct-with-serde-defaults
//! convention: every sub-struct field carries `#[serde(default = "...")]`
//! paired with a free function of the same name, and the struct additionally
//! derives a manual `impl Default` so the whole tree is constructible
//! without a file present.

use std::path::Path;
use std::time::Duration;

use hedge_http::{CircuitBreakerConfig, PoolConfig, RateLimitConfig, RetryConfig};
use hedge_orchestrator::BudgetLimits;
use hedge_strategy::HedgeRatios;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, BotResult};

/// Operating mode. In `Observation`, the orchestrator runs its full
/// selection/sizing/dry-run logging path but venue adapters skip
/// `place_order`/`close_position` — an explicit mode, never a silent
/// fallback to simulated positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    #[default]
    Observation,
    Trading,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeRatioConfig {
    #[serde(default = "default_depeg_ratio")]
    pub depeg: Decimal,
    #[serde(default = "default_smart_contract_ratio")]
    pub smart_contract: Decimal,
    #[serde(default = "default_oracle_ratio")]
    pub oracle: Decimal,
    #[serde(default = "default_bridge_ratio")]
    pub bridge: Decimal,
    #[serde(default = "default_cex_liquidation_ratio")]
    pub cex_liquidation: Decimal,
}

fn default_depeg_ratio() -> Decimal {
    HedgeRatios::default().depeg
}
fn default_smart_contract_ratio() -> Decimal {
    HedgeRatios::default().smart_contract
}
fn default_oracle_ratio() -> Decimal {
    HedgeRatios::default().oracle
}
fn default_bridge_ratio() -> Decimal {
    HedgeRatios::default().bridge
}
fn default_cex_liquidation_ratio() -> Decimal {
    HedgeRatios::default().cex_liquidation
}

impl Default for HedgeRatioConfig {
    fn default() -> Self {
        let defaults = HedgeRatios::default();
        Self {
            depeg: defaults.depeg,
            smart_contract: defaults.smart_contract,
            oracle: defaults.oracle,
            bridge: defaults.bridge,
            cex_liquidation: defaults.cex_liquidation,
        }
    }
}

impl From<&HedgeRatioConfig> for HedgeRatios {
    fn from(cfg: &HedgeRatioConfig) -> Self {
        Self {
            depeg: cfg.depeg,
            smart_contract: cfg.smart_contract,
            oracle: cfg.oracle,
            bridge: cfg.bridge,
            cex_liquidation: cfg.cex_liquidation,
        }
    }
}

/// Per-iteration budget, plus loop timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_policies_per_iteration")]
    pub max_policies_per_iteration: usize,
    #[serde(default = "default_max_aggregate_notional_usd")]
    pub max_aggregate_notional_usd: Decimal,
    #[serde(default = "default_loop_period_secs")]
    pub loop_period_secs: u64,
    #[serde(default = "default_iteration_deadline_secs")]
    pub iteration_deadline_secs: u64,
    /// Re-read at the start of every iteration.
    #[serde(default)]
    pub pause_new_openings: bool,
}

fn default_max_policies_per_iteration() -> usize {
    50
}
fn default_max_aggregate_notional_usd() -> Decimal {
    Decimal::from(1_000_000)
}
fn default_loop_period_secs() -> u64 {
    30
}
fn default_iteration_deadline_secs() -> u64 {
    20
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_policies_per_iteration: default_max_policies_per_iteration(),
            max_aggregate_notional_usd: default_max_aggregate_notional_usd(),
            loop_period_secs: default_loop_period_secs(),
            iteration_deadline_secs: default_iteration_deadline_secs(),
            pause_new_openings: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn budget(&self) -> BudgetLimits {
        BudgetLimits {
            max_policies_per_iteration: self.max_policies_per_iteration,
            max_aggregate_notional_usd: hedge_core::Usd::new(self.max_aggregate_notional_usd),
        }
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_secs(self.loop_period_secs)
    }

    pub fn iteration_deadline(&self) -> Duration {
        Duration::from_secs(self.iteration_deadline_secs)
    }
}

/// Lifecycle loop timing and liquidation-risk thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default = "default_lifecycle_loop_period_secs")]
    pub loop_period_secs: u64,
    #[serde(default = "default_liquidation_warning_threshold")]
    pub liquidation_warning_threshold: Decimal,
    #[serde(default = "default_liquidation_critical_threshold")]
    pub liquidation_critical_threshold: Decimal,
}

fn default_lifecycle_loop_period_secs() -> u64 {
    60
}
fn default_liquidation_warning_threshold() -> Decimal {
    Decimal::new(50, 2)
}
fn default_liquidation_critical_threshold() -> Decimal {
    Decimal::new(80, 2)
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            loop_period_secs: default_lifecycle_loop_period_secs(),
            liquidation_warning_threshold: default_liquidation_warning_threshold(),
            liquidation_critical_threshold: default_liquidation_critical_threshold(),
        }
    }
}

impl LifecycleConfig {
    /// A 30-120s poll period is required; `from_file` rejects anything
    /// outside that band rather than silently clamping it.
    pub fn validate(&self) -> BotResult<()> {
        if !(30..=120).contains(&self.loop_period_secs) {
            return Err(BotError::Config(format!(
                "lifecycle.loop_period_secs must be in [30, 120], got {}",
                self.loop_period_secs
            )));
        }
        Ok(())
    }

    pub fn loop_period(&self) -> Duration {
        Duration::from_secs(self.loop_period_secs)
    }
}

/// Global HTTP defaults every venue client inherits when a field is
/// omitted from its own `http` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpDefaultsConfig {
    #[serde(default)]
    pub pool: PoolConfigSection,
    #[serde(default)]
    pub retry: RetryConfigSection,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfigSection,
    #[serde(default)]
    pub rate_limit: RateLimitConfigSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfigSection {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
}

fn default_max_connections() -> usize {
    PoolConfig::default().max_connections
}
fn default_connection_timeout_secs() -> u64 {
    PoolConfig::default().connection_timeout.as_secs()
}

impl Default for PoolConfigSection {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            connection_timeout_secs: default_connection_timeout_secs(),
        }
    }
}

impl From<&PoolConfigSection> for PoolConfig {
    fn from(cfg: &PoolConfigSection) -> Self {
        Self {
            max_connections: cfg.max_connections,
            connection_timeout: Duration::from_secs(cfg.connection_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfigSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
    #[serde(default = "default_retryable_status_codes")]
    pub retryable_status_codes: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    RetryConfig::default().max_attempts
}
fn default_base_delay_ms() -> u64 {
    RetryConfig::default().backoff.base_delay.as_millis() as u64
}
fn default_max_delay_ms() -> u64 {
    RetryConfig::default().backoff.max_delay.as_millis() as u64
}
fn default_multiplier() -> f64 {
    RetryConfig::default().backoff.multiplier
}
fn default_jitter_fraction() -> f64 {
    RetryConfig::default().backoff.jitter_fraction
}
fn default_retryable_status_codes() -> Vec<u16> {
    RetryConfig::default().retryable_status_codes
}

impl Default for RetryConfigSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_fraction: default_jitter_fraction(),
            retryable_status_codes: default_retryable_status_codes(),
        }
    }
}

impl From<&RetryConfigSection> for RetryConfig {
    fn from(cfg: &RetryConfigSection) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            backoff: hedge_http::BackoffConfig {
                base_delay: Duration::from_millis(cfg.base_delay_ms),
                max_delay: Duration::from_millis(cfg.max_delay_ms),
                multiplier: cfg.multiplier,
                jitter_fraction: cfg.jitter_fraction,
            },
            retryable_status_codes: cfg.retryable_status_codes.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfigSection {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_breaker_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_half_open_success_threshold")]
    pub half_open_success_threshold: u32,
}

fn default_failure_threshold() -> u32 {
    CircuitBreakerConfig::default().failure_threshold
}
fn default_breaker_timeout_secs() -> u64 {
    CircuitBreakerConfig::default().timeout.as_secs()
}
fn default_half_open_success_threshold() -> u32 {
    CircuitBreakerConfig::default().half_open_success_threshold
}

impl Default for CircuitBreakerConfigSection {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            timeout_secs: default_breaker_timeout_secs(),
            half_open_success_threshold: default_half_open_success_threshold(),
        }
    }
}

impl From<&CircuitBreakerConfigSection> for CircuitBreakerConfig {
    fn from(cfg: &CircuitBreakerConfigSection) -> Self {
        Self {
            failure_threshold: cfg.failure_threshold,
            timeout: Duration::from_secs(cfg.timeout_secs),
            half_open_success_threshold: cfg.half_open_success_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfigSection {
    #[serde(default = "default_tokens_per_second")]
    pub tokens_per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: f64,
}

fn default_tokens_per_second() -> f64 {
    RateLimitConfig::default().tokens_per_second
}
fn default_burst() -> f64 {
    RateLimitConfig::default().burst
}

impl Default for RateLimitConfigSection {
    fn default() -> Self {
        Self {
            tokens_per_second: default_tokens_per_second(),
            burst: default_burst(),
        }
    }
}

impl From<&RateLimitConfigSection> for RateLimitConfig {
    fn from(cfg: &RateLimitConfigSection) -> Self {
        Self {
            tokens_per_second: cfg.tokens_per_second,
            burst: cfg.burst,
        }
    }
}

/// Per-venue client config: endpoints, credentials, and an optional `http`
/// override block layered over `http_defaults`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub private_key_env_var: Option<String>,
    #[serde(default)]
    pub testnet: bool,
    #[serde(default)]
    pub http: Option<HttpDefaultsConfig>,
}

impl VenueConfig {
    pub fn client_config(&self, defaults: &HttpDefaultsConfig, fallback_endpoints: &[&str]) -> hedge_http::ClientConfig {
        let http = self.http.as_ref().unwrap_or(defaults);
        let endpoints = if self.endpoints.is_empty() {
            fallback_endpoints.iter().map(|s| s.to_string()).collect()
        } else {
            self.endpoints.clone()
        };
        hedge_http::ClientConfig {
            endpoints,
            default_headers: Vec::new(),
            pool: (&http.pool).into(),
            request_timeout: Duration::from_secs(10),
            retry: (&http.retry).into(),
            circuit_breaker: (&http.circuit_breaker).into(),
            rate_limit: (&http.rate_limit).into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenuesConfig {
    #[serde(default)]
    pub polymarket: VenueConfig,
    #[serde(default)]
    pub hyperliquid: VenueConfig,
    #[serde(default)]
    pub binance: VenueConfig,
    #[serde(default)]
    pub gmx: VenueConfig,
}

/// The aggregate configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub operating_mode: OperatingMode,
    #[serde(default)]
    pub hedge_ratios: HedgeRatioConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub venues: VenuesConfig,
    #[serde(default)]
    pub http_defaults: HttpDefaultsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            operating_mode: OperatingMode::default(),
            hedge_ratios: HedgeRatioConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            lifecycle: LifecycleConfig::default(),
            venues: VenuesConfig::default(),
            http_defaults: HttpDefaultsConfig::default(),
        }
    }
}

impl AppConfig {
    /// `HEDGE_CONFIG` env var as a path if set, else `config/default.toml`,
    /// else `Self::default()` with a warning — never a hard failure at
    /// startup for a missing file.
    pub fn load() -> BotResult<Self> {
        let path = std::env::var("HEDGE_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        if Path::new(&path).exists() {
            Self::from_file(&path)
        } else {
            tracing::warn!(path = %path, "no config file found, using built-in defaults");
            let config = Self::default();
            config.lifecycle.validate()?;
            Ok(config)
        }
    }

    pub fn from_file(path: &str) -> BotResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| BotError::Config(e.to_string()))?;
        config.lifecycle.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_lifecycle_validation() {
        let config = AppConfig::default();
        assert!(config.lifecycle.validate().is_ok());
    }

    #[test]
    fn out_of_band_lifecycle_period_is_rejected() {
        let config = LifecycleConfig {
            loop_period_secs: 10,
            ..LifecycleConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn hedge_ratio_defaults_match_expected_values() {
        let ratios = HedgeRatioConfig::default();
        assert_eq!(ratios.depeg, default_depeg_ratio());
        assert_eq!(ratios.bridge, default_bridge_ratio());
    }

    #[test]
    fn toml_round_trip_preserves_operating_mode() {
        let toml_src = "operating_mode = \"trading\"\n";
        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.operating_mode, OperatingMode::Trading);
    }
}
