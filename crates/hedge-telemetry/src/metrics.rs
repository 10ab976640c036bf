//! Prometheus metrics for the hedge orchestrator.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, GaugeVec, HistogramVec,
};

/// Outbound HTTP requests issued through `hedge-http` clients.
/// Labels: venue, endpoint, outcome (success/retry/failure).
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hedge_http_requests_total",
        "Total HTTP requests issued to venue/oracle endpoints",
        &["venue", "endpoint", "outcome"]
    )
    .unwrap()
});

/// Circuit breaker state per (client, endpoint): 0=Closed, 1=Open, 2=HalfOpen.
pub static CIRCUIT_BREAKER_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "hedge_circuit_breaker_state",
        "Circuit breaker state (0=closed, 1=open, 2=half_open)",
        &["venue", "endpoint"]
    )
    .unwrap()
});

/// Strategy execution attempts. Labels: strategy, outcome (opened/declined).
pub static EXECUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "hedge_executions_total",
        "Total strategy execution attempts",
        &["strategy", "outcome"]
    )
    .unwrap()
});

/// Currently open hedge positions. Labels: venue, strategy.
pub static OPEN_POSITIONS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "hedge_open_positions",
        "Count of positions currently Open",
        &["venue", "strategy"]
    )
    .unwrap()
});

/// Orchestrator loop iteration duration in seconds.
pub static ORCHESTRATOR_ITERATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hedge_orchestrator_iteration_seconds",
        "Orchestrator loop iteration duration in seconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

/// Lifecycle loop iteration duration in seconds.
pub static LIFECYCLE_ITERATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "hedge_lifecycle_iteration_seconds",
        "Lifecycle loop iteration duration in seconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_panicking() {
        HTTP_REQUESTS_TOTAL.with_label_values(&["hyperliquid", "/info", "success"]).inc();
        CIRCUIT_BREAKER_STATE.with_label_values(&["hyperliquid", "/info"]).set(0.0);
        EXECUTIONS_TOTAL.with_label_values(&["depeg", "opened"]).inc();
        OPEN_POSITIONS.with_label_values(&["hyperliquid", "short_perp"]).set(1.0);
        ORCHESTRATOR_ITERATION_SECONDS.with_label_values(&["ok"]).observe(0.2);
        LIFECYCLE_ITERATION_SECONDS.with_label_values(&["ok"]).observe(0.2);
    }
}
