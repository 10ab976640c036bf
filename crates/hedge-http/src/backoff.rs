//! Exponential backoff with jitter, extracted from the connection manager's
//! reconnect-delay calculation into a standalone reusable function.

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_fraction: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_fraction: 0.2,
        }
    }
}

/// Delay before retry `attempt` (1-indexed):
/// `min(max_delay, base_delay * multiplier^(attempt-1))`, scaled by a
/// uniform random factor in `[1 - jitter_fraction, 1 + jitter_fraction]`.
pub fn delay_for_attempt(config: &BackoffConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let raw = config.base_delay.as_secs_f64() * config.multiplier.powi(exponent);
    let capped = raw.min(config.max_delay.as_secs_f64());

    let jitter_factor = if config.jitter_fraction > 0.0 {
        let mut rng = rand::thread_rng();
        rng.gen_range((1.0 - config.jitter_fraction)..=(1.0 + config.jitter_fraction))
    } else {
        1.0
    };

    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}
