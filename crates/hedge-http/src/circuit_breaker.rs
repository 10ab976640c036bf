//! Per-(client, endpoint) circuit breaker.
//!
//! Generalizes the bot-wide hard-stop latch pattern (an atomically
//! CAS-guarded trigger with a logged reason) from a single global switch
//! into one instance per endpoint, and adds automatic Open -> HalfOpen ->
//! Closed recovery — the hard-stop latch only ever resets manually, but an
//! endpoint circuit must recover on its own once the cooldown elapses.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout: Duration,
    pub half_open_success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            half_open_success_threshold: 2,
        }
    }
}

/// One breaker per endpoint. Shared across concurrent callers.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
    opened_at_ms: AtomicU64,
    /// Guards the single half-open probe admitted per cooldown expiry.
    probe_in_flight: AtomicU32,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
            probe_in_flight: AtomicU32::new(0),
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read()
    }

    /// Call before issuing a request on this endpoint. Returns `true` if
    /// the request may proceed (and, for a half-open probe, reserves the
    /// single admitted slot).
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                // Only one probe in flight at a time.
                self.probe_in_flight
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok()
            }
            CircuitState::Open => {
                let elapsed = now_ms().saturating_sub(self.opened_at_ms.load(Ordering::SeqCst));
                if elapsed >= self.config.timeout.as_millis() as u64 {
                    self.transition_to_half_open();
                    // Immediately try to claim the probe slot just opened.
                    self.probe_in_flight
                        .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                } else {
                    false
                }
            }
        }
    }

    fn transition_to_half_open(&self) {
        let mut state = self.state.write();
        if *state == CircuitState::Open {
            *state = CircuitState::HalfOpen;
            self.half_open_successes.store(0, Ordering::SeqCst);
            self.probe_in_flight.store(0, Ordering::SeqCst);
            info!("circuit breaker entering half-open");
        }
    }

    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
                self.probe_in_flight.store(0, Ordering::SeqCst);
                if successes >= self.config.half_open_success_threshold {
                    let mut state = self.state.write();
                    *state = CircuitState::Closed;
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    info!("circuit breaker closed after successful half-open probes");
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                warn!("circuit breaker probe failed, reopening");
                self.probe_in_flight.store(0, Ordering::SeqCst);
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    fn open(&self) {
        let mut state = self.state.write();
        *state = CircuitState::Open;
        self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
        error!("circuit breaker open");
    }

    /// Manual reset, e.g. for an operator action or test setup.
    pub fn reset(&self) {
        *self.state.write() = CircuitState::Closed;
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.half_open_successes.store(0, Ordering::SeqCst);
        self.probe_in_flight.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            timeout: Duration::from_millis(20),
            half_open_success_threshold: 2,
        })
    }

    #[test]
    fn opens_after_failure_threshold_consecutive_failures() {
        let cb = breaker();
        assert_eq!(cb.state(), CircuitState::Closed);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn success_resets_consecutive_failure_count_while_closed() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        // Only 2 consecutive after the reset, still below threshold of 3.
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_after_cooldown_admits_single_probe() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Second concurrent caller is refused the probe slot.
        assert!(!cb.allow_request());
    }

    #[test]
    fn closes_after_half_open_success_threshold() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.allow_request());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_and_resets_cooldown() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.allow_request());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }
}
